// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod approvals;
pub mod audit;
pub mod coordinator;
pub mod engine;
pub mod submitter;
