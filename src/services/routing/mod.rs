// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod aggregator;
pub mod commands;
pub mod discovery;
pub mod encoder;
pub mod pool_id;
pub mod quote;
pub mod registry;
