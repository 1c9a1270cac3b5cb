#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid entity id: `{0}`")]
    InvalidEntityID(String),
}
pub type Result<T> = std::result::Result<T, Error>;
