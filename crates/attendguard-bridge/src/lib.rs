// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// attendguard: Platform bridge contracts.
//
// Defines the collaborator traits the integrity layer consumes (secret
// storage, device information, the attendance record store).  Mobile hosts
// inject their native Keystore / Keychain bridge; desktop and CI builds use
// the stub, whose secret storage is unavailable.

pub mod memory;
pub mod traits;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

pub use traits::{AttendanceStore, DeviceInfoSource, PlatformBridge, SecretStorage};
