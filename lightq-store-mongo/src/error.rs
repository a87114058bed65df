use lightq_store::StoreError;

/// Converts a raw MongoDB driver error into the store's transient/permanent
/// split: I/O and server-selection failures are transient (worth retrying
/// with bounded backoff); everything else is permanent.
pub fn classify(err: mongodb::error::Error) -> StoreError {
    use mongodb::error::ErrorKind;
    match err.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Transient(Box::new(err))
        }
        _ => StoreError::Permanent(Box::new(err)),
    }
}
