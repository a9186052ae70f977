use std::io;

/// Hands external URLs to the desktop.
pub trait Opener: Send {
    /// # Errors
    ///
    /// Returns an error when no handler could be launched.
    fn open(&mut self, url: &str) -> io::Result<()>;
}

impl<T: Opener + ?Sized> Opener for &mut T {
    fn open(&mut self, url: &str) -> io::Result<()> {
        (**self).open(url)
    }
}

/// Uses the platform's default handler via the `open` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&mut self, url: &str) -> io::Result<()> {
        tracing::debug!(url, "opening external link");
        open::that(url)
    }
}

/// Records URLs instead of opening them.
#[derive(Debug, Default, Clone)]
pub struct RecordingOpener {
    pub opened: Vec<String>,
}

impl Opener for RecordingOpener {
    fn open(&mut self, url: &str) -> io::Result<()> {
        self.opened.push(url.to_string());
        Ok(())
    }
}
