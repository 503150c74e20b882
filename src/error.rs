use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// A simple static-message error for conditions the library detects itself.
#[derive(Debug, Clone, Copy)]
pub struct FenceWatchError {
    pub msg: &'static str,
}

impl Display for FenceWatchError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for FenceWatchError {}
