// src/display/mock.rs

use crate::display::driver::Presenter;
use crate::display::pool::BufferId;
use crate::error::DisplayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterCall {
    CreateBuffer(BufferId),
    DestroyBuffer(BufferId),
    RequestFrame,
    Damage { width: u32, height: u32 },
    Attach(BufferId),
    Commit,
    Flush,
}

/// Records every request; buffers are just their ids.
#[derive(Debug, Default)]
pub struct MockPresenter {
    calls: Vec<PresenterCall>,
    fail_create: bool,
}

impl MockPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_buffer_creation(&mut self) {
        self.fail_create = true;
    }

    pub fn calls(&self) -> &[PresenterCall] {
        &self.calls
    }

    pub fn commits(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == PresenterCall::Commit)
            .count()
    }

    pub fn attached(&self) -> Vec<BufferId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Attach(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Presenter for MockPresenter {
    type Buffer = BufferId;

    fn create_buffer(&mut self, id: BufferId) -> Result<BufferId, DisplayError> {
        if self.fail_create {
            return Err(DisplayError::Allocation("mock buffer creation".into()));
        }
        self.calls.push(PresenterCall::CreateBuffer(id));
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.calls.push(PresenterCall::DestroyBuffer(buffer));
    }

    fn request_frame(&mut self) -> Result<(), DisplayError> {
        self.calls.push(PresenterCall::RequestFrame);
        Ok(())
    }

    fn damage(&mut self, width: u32, height: u32) {
        self.calls.push(PresenterCall::Damage { width, height });
    }

    fn attach(&mut self, buffer: &BufferId) {
        self.calls.push(PresenterCall::Attach(*buffer));
    }

    fn commit(&mut self) {
        self.calls.push(PresenterCall::Commit);
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.calls.push(PresenterCall::Flush);
        Ok(())
    }
}
