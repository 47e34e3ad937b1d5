use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshHerdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSH connection error: {0}")]
    Ssh(String),

    #[error("Host file error: {0}")]
    HostFile(String),

    #[error("Interactive mode error: {0}")]
    Interactive(String),

    #[error("No host specified!")]
    NoHosts,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("SSH protocol error: {0}")]
    SshProtocol(#[from] russh::Error),
}

pub type Result<T> = std::result::Result<T, SshHerdError>;
