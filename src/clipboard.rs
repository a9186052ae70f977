use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard error: {0}")]
    Backend(#[from] arboard::Error),
}

/// Destination for "copy external link".
pub trait Clipboard: Send {
    /// # Errors
    ///
    /// Returns an error when the system clipboard cannot be reached.
    fn set(&mut self, contents: &str) -> Result<(), ClipboardError>;
}

impl<T: Clipboard + ?Sized> Clipboard for &mut T {
    fn set(&mut self, contents: &str) -> Result<(), ClipboardError> {
        (**self).set(contents)
    }
}

/// System clipboard through arboard, opened lazily on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set(&mut self, contents: &str) -> Result<(), ClipboardError> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => arboard::Clipboard::new()?,
        };
        let clipboard = self.inner.insert(clipboard);
        clipboard.set_text(contents.to_string())?;
        Ok(())
    }
}

/// Keeps everything it was handed. Used where no system clipboard exists.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    pub contents: Vec<String>,
}

impl Clipboard for MemoryClipboard {
    fn set(&mut self, contents: &str) -> Result<(), ClipboardError> {
        self.contents.push(contents.to_string());
        Ok(())
    }
}
