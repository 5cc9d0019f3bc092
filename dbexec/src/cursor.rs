use dbexec_driver::{Connection, DataRow, QueryResult, Result};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CursorState {
    Reading,
    /// The current result set is exhausted and the driver is positioned on the next one
    NextResultReady,
    Closed,
}

/// Live, connection bound sequence of rows.
///
/// The cursor owns the connection its command ran on.  The connection is closed once every
/// result set has been read, when [`close`](Cursor::close) is called, or when the cursor is
/// dropped.
#[derive(Debug)]
pub struct Cursor {
    connection: Option<Box<dyn Connection>>,
    result: Option<Box<dyn QueryResult>>,
    columns: Arc<[String]>,
    state: CursorState,
}

impl Cursor {
    pub(crate) fn new(connection: Box<dyn Connection>, result: Box<dyn QueryResult>) -> Self {
        let columns = result.columns().into();
        Self {
            connection: Some(connection),
            result: Some(result),
            columns,
            state: CursorState::Reading,
        }
    }

    /// Column names of the current result set
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Next row of the current result set.  Returns `None` at the end of the result set; the
    /// connection is closed at that point unless another result set follows.
    ///
    /// # Errors
    /// * If the driver fails while producing the row; the connection is closed first
    pub fn next_row(&mut self) -> Result<Option<DataRow>> {
        if self.state != CursorState::Reading {
            return Ok(None);
        }
        let Some(result) = self.result.as_mut() else {
            return Ok(None);
        };

        let next = match result.next() {
            Ok(Some(values)) => return Ok(Some(DataRow::new(Arc::clone(&self.columns), values))),
            Ok(None) => result.next_result(),
            Err(error) => Err(error),
        };
        match next {
            Ok(true) => {
                self.state = CursorState::NextResultReady;
                Ok(None)
            }
            Ok(false) => {
                self.close()?;
                Ok(None)
            }
            Err(error) => {
                self.release();
                Err(error)
            }
        }
    }

    /// Advance to the next result set, skipping any unread rows of the current one.  Returns
    /// false, and closes the connection, when there are no more result sets.
    ///
    /// # Errors
    /// * If the driver fails while advancing; the connection is closed first
    pub fn next_result(&mut self) -> Result<bool> {
        let advanced = match self.state {
            CursorState::Closed => return Ok(false),
            CursorState::NextResultReady => Ok(true),
            CursorState::Reading => match self.result.as_mut() {
                Some(result) => result.next_result(),
                None => Ok(false),
            },
        };

        match advanced {
            Ok(true) => {
                if let Some(result) = &self.result {
                    self.columns = result.columns().into();
                }
                self.state = CursorState::Reading;
                Ok(true)
            }
            Ok(false) => {
                self.close()?;
                Ok(false)
            }
            Err(error) => {
                self.release();
                Err(error)
            }
        }
    }

    /// Release the query result and close the connection
    ///
    /// # Errors
    /// * If the driver fails to close the connection
    pub fn close(&mut self) -> Result<()> {
        self.state = CursorState::Closed;
        self.result = None;
        if let Some(mut connection) = self.connection.take() {
            connection.close()?;
            debug!("cursor connection closed");
        }
        Ok(())
    }

    /// Close on an error path, logging rather than returning close failures
    fn release(&mut self) {
        if let Err(error) = self.close() {
            warn!(%error, "failed to close cursor connection");
        }
    }
}

impl Iterator for Cursor {
    type Item = Result<DataRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.release();
        }
    }
}
