//! Helpdesk - ticket lifecycle stepper
//!
//! Derives the progress stepper for a helpdesk ticket from its snapshot, talks
//! to the ticket API on behalf of the dashboards, and serves resolved steppers
//! over REST.

pub mod actions;
pub mod config;
pub mod logging;
pub mod notifications;
pub mod rest;
pub mod service;
pub mod stepper;
pub mod ticket;
