//! Frames as routed to a channel's event loop

use krolik_types::Method;

use crate::frames::ContentHeader;
use crate::Payload;

/// The three frame kinds that can arrive on a channel id above zero
#[derive(Debug)]
pub(crate) enum ChannelFrame {
    Method(Method),
    Header(ContentHeader),
    Body(Payload),
}
