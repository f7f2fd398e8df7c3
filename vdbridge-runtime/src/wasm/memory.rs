// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Guest memory access
//!
//! Strings cross the boundary as a byte offset into the guest's linear
//! memory, terminated by a zero byte.

use vdbridge_core::{BridgeError, BridgeResult};

/// Decode the zero-terminated string starting at `ptr`.
///
/// At most `max_len` bytes are scanned before the terminator. The bytes are
/// copied out of `memory` before decoding, and invalid UTF-8 is replaced with
/// U+FFFD.
pub fn read_c_string(memory: &[u8], ptr: u32, max_len: usize) -> BridgeResult<String> {
    let start = ptr as usize;
    if start >= memory.len() {
        return Err(BridgeError::OutOfBoundsRead {
            ptr,
            len: memory.len(),
        });
    }

    // Room for `max_len` bytes plus the terminator.
    let limit = start.saturating_add(max_len).saturating_add(1);
    let end = limit.min(memory.len());
    let window = &memory[start..end];

    match window.iter().position(|b| *b == 0) {
        Some(nul) => {
            let bytes = window[..nul].to_vec();
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None if end == limit => Err(BridgeError::StringTooLong { ptr, max: max_len }),
        None => Err(BridgeError::OutOfBoundsRead {
            ptr,
            len: memory.len(),
        }),
    }
}
