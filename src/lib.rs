//! A framer and decoder for the Taiwan Stock Exchange (TWSE) UDP
//! market-data wire protocol.
//!
//! The pipeline is: [`socket::SocketSource`] yields raw datagrams,
//! [`framer::frames`] splits a datagram into zero or more CRLF-terminated
//! candidate frames, [`decoder::decode`] turns a candidate frame into a
//! [`record::Record`] or a rejection reason, and [`control::Session`] owns
//! the background thread that drives this loop and calls a
//! [`consumer::Consumer`] with each decoded record.
//!
//! ```no_run
//! use twse_feed::{Config, Session};
//!
//! let mut session = Session::new();
//! session
//!     .start(Config::default(), |record: &twse_feed::Record| {
//!         println!("{:?}", record);
//!     })
//!     .expect("failed to start session");
//! // ... run until signaled ...
//! session.stop().expect("failed to stop session");
//! ```

pub mod bcd;
pub mod config;
pub mod consumer;
pub mod control;
pub mod decoder;
pub mod error;
pub mod framer;
pub mod record;
pub mod socket;

pub use config::Config;
pub use consumer::Consumer;
pub use control::Session;
pub use decoder::RejectReason;
pub use error::SessionError;
pub use record::Record;
