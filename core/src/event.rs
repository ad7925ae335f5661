//! Ancillary per-dispatcher event feeds.
//!
//! The operations tooling records these outside of stubs and loads. The
//! scoring core only ever counts or sums them per dispatcher and window.

use crate::types::DispatcherId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherEvent {
    pub dispatcher: DispatcherId,
    pub date:       NaiveDate,
    #[serde(flatten)]
    pub kind:       DispatcherEventKind,
}

impl DispatcherEvent {
    pub fn new(dispatcher: impl Into<DispatcherId>, date: NaiveDate, kind: DispatcherEventKind) -> Self {
        Self { dispatcher: dispatcher.into(), date, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatcherEventKind {
    /// A load delivered late, with the number of days overdue.
    OverdueLoad { days: f64 },
    /// A load still open on the Tuesday after its week closed.
    TuesdayOpen,
    MissingPaperwork,
    TrailerDrop,
    TrailerRecovery,
    /// Minutes spent in the rate calculator.
    CalculatorUsage { minutes: f64 },
    /// Minutes from rate confirmation receipt to entry.
    RcEntry { minutes: f64 },
}

impl DispatcherEventKind {
    /// Feed this event belongs to; one compliance metric per feed.
    pub fn feed(&self) -> EventFeed {
        match self {
            Self::OverdueLoad { .. }     => EventFeed::Overdue,
            Self::TuesdayOpen            => EventFeed::TuesdayOpen,
            Self::MissingPaperwork       => EventFeed::Paperwork,
            Self::TrailerDrop            => EventFeed::TrailerDrops,
            Self::TrailerRecovery        => EventFeed::TrailerRecoveries,
            Self::CalculatorUsage { .. } => EventFeed::Calculator,
            Self::RcEntry { .. }         => EventFeed::RcEntry,
        }
    }

    /// Contribution to the feed's per-window figure.
    pub fn amount(&self) -> f64 {
        match self {
            Self::OverdueLoad { days }        => *days,
            Self::CalculatorUsage { minutes } => *minutes,
            Self::RcEntry { minutes }         => *minutes,
            _                                 => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventFeed {
    Overdue,
    TuesdayOpen,
    Paperwork,
    TrailerDrops,
    TrailerRecoveries,
    Calculator,
    RcEntry,
}
