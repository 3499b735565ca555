pub mod channel;
pub mod controller;
pub mod display;
pub mod sms;
pub mod tally;

pub use channel::CatchUpChannel;
pub use controller::{ChannelNames, PollController, PollEvent};
