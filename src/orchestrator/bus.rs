//! The message bus itself: holds the middleware-wrapped pipeline and
//! dispatches messages in arrival order (spec §4.8, §5 "messages from a
//! given source are processed in send order").

use super::messages::{Message, Response};
use super::middleware::{build_pipeline, HandlerFn};

pub struct Bus {
    pipeline: Box<HandlerFn>,
}

impl Bus {
    pub fn new(core: impl Fn(Message) -> Response + Send + Sync + 'static) -> Self {
        Self { pipeline: build_pipeline(Box::new(core)) }
    }

    pub fn dispatch(&self, message: Message) -> Response {
        (self.pipeline)(message)
    }
}
