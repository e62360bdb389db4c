//! The two background cleaners.
//!
//! Each named cache gets one [`stale`] and one [`temp`] cleaner task,
//! addressable by cache name. Client operations never wait on either:
//! they only ever send a fire-and-forget hint.

pub mod stale;
pub mod temp;
