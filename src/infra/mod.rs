// SPDX-License-Identifier: Apache-2.0
//! mod
//!
//! Layer: Infrastructure
//! Purpose:
//! - Concrete transports behind the port contracts.
//!
//! Notes:
//! - Standard file header. Keep stable to avoid churn.

pub mod switch_port;
pub mod tap_port;
pub mod tunnel_port;
