pub(crate) mod subscription;
pub(crate) mod token;
