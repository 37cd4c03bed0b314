pub mod conversation;
pub mod message;
pub mod user;

/// Snowflake ids exceed the integer precision of JavaScript clients, so they
/// go over the wire as strings.
pub(crate) fn serialize_i64_as_string<S: serde::Serializer>(val: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&val.to_string())
}
