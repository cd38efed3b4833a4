// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Zeref: Vault Client Library
//!
//! Client-side plumbing for the Zeref yield vault on Stacks: look up
//! balances and prices, read the vault contract, and hand deposits and
//! withdrawals to the user's wallet for signing.
//!
//! ## Architecture
//!
//! - **address**: Stacks address checks and the c32check codec.
//! - **amount**: Display units ⇄ micro-units, with deposit bounds.
//! - **clarity**: Clarity value wire format for contract arguments/results.
//! - **market**: STX balance and STX/USD price, degrading instead of failing.
//! - **portfolio**: Balance × price for the dashboard.
//! - **session**: Who is signed in, observable.
//! - **vault**: Contract reads, submissions, action state machine, previews.
//! - **config**: Constants, network selection, runtime config.
//!
//! ## Ground Rules
//!
//! 1. Amounts cross module boundaries as `u64` micro-units.
//! 2. No keys, no signing. A wallet does that.
//! 3. Nothing is cached; every answer is as fresh as the last request.
//! 4. Bad external input never panics.

pub mod address;
pub mod amount;
pub mod clarity;
pub mod config;
pub mod http;
pub mod market;
pub mod portfolio;
pub mod session;
pub mod vault;
