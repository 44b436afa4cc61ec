use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("payload of {len} bytes exceeds the {max}-byte per-slot cap")]
    PayloadTooLarge { len: usize, max: usize },
}
