//! The consumer-facing side of dispatch: the trait the decoder calls, and
//! two optional wrappers (`StockFilterConsumer`, `ChannelConsumer`) built on
//! top of it.

use std::sync::mpsc::SyncSender;

use crate::record::Record;

/// Receives decoded records on the receive thread. Implementations must
/// return promptly: a slow consumer blocks ingress, since there is no
/// internal queue between the decoder and the consumer by default.
///
/// `record` must not be retained past the call: it borrows from state owned
/// by the decode loop.
pub trait Consumer {
    fn on_record(&self, record: &Record);
}

impl<F: Fn(&Record)> Consumer for F {
    fn on_record(&self, record: &Record) {
        self(record)
    }
}

/// Wraps a `Consumer`, suppressing records whose stock code does not match
/// `stock_code`. Warrant-reference records (which carry no stock code) are
/// always suppressed once a filter is active.
pub struct StockFilterConsumer<C> {
    inner: C,
    stock_code: [u8; 6],
}

impl<C: Consumer> StockFilterConsumer<C> {
    pub fn new(inner: C, stock_code: [u8; 6]) -> Self {
        StockFilterConsumer { inner, stock_code }
    }
}

impl<C: Consumer> Consumer for StockFilterConsumer<C> {
    fn on_record(&self, record: &Record) {
        if record.stock_code() == Some(&self.stock_code) {
            self.inner.on_record(record);
        }
    }
}

/// Decouples the decoder thread from a slow consumer by handing decoded
/// records to a bounded channel instead of calling the real consumer
/// in-line. Opt-in: the default dispatch path never constructs one of
/// these itself.
///
/// Records are cloned onto the channel since `Consumer::on_record` only
/// borrows; the receiving end owns its copy.
pub struct ChannelConsumer {
    tx: SyncSender<Record>,
}

impl ChannelConsumer {
    pub fn new(tx: SyncSender<Record>) -> Self {
        ChannelConsumer { tx }
    }
}

impl Consumer for ChannelConsumer {
    fn on_record(&self, record: &Record) {
        if self.tx.send(record.clone()).is_err() {
            log::error!("ChannelConsumer receiver dropped; discarding record");
        }
    }
}
