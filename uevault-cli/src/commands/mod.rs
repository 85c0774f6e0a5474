pub(crate) mod cleanup;
pub(crate) mod export;
pub(crate) mod fetch;
pub(crate) mod list;
pub(crate) mod user_fields;
