pub mod export;
pub mod thread;

pub use export::{
    ExportMedia, ExportMessage, ExportParticipant, ExportReaction, ExportShare, ExportThread,
    ExportVideo,
};
pub use thread::{MediaRef, Message, Participant, Reaction, Share, Thread, Video};
