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

//! Property tests for handle allocation and recycling

use proptest::prelude::*;
use std::collections::{HashMap, VecDeque};
use vdbridge_core::{BridgeError, Handle, ResourceTable};

#[derive(Debug, Clone)]
enum Op {
    Add(u64),
    /// Release the n-th live handle (modulo live count)
    Release(usize),
    /// Release a handle that was already released, if any
    ReleaseStale(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u64>().prop_map(Op::Add),
        2 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::ReleaseStale),
    ]
}

proptest! {
    /// Live handles resolve to the object last added under them, released
    /// handles fail, and reuse follows release order.
    #[test]
    fn prop_table_matches_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut table = ResourceTable::new();
        let mut live: HashMap<Handle, u64> = HashMap::new();
        let mut order: Vec<Handle> = Vec::new();
        let mut released: VecDeque<Handle> = VecDeque::new();
        let mut ever_released: Vec<Handle> = Vec::new();
        let mut next_id = 1u32;

        for op in ops {
            match op {
                Op::Add(value) => {
                    let expected = released.pop_front().unwrap_or_else(|| {
                        let h = Handle::from_raw(next_id);
                        next_id += 1;
                        h
                    });
                    let handle = table.add(value).unwrap();
                    prop_assert!(!handle.is_null());
                    prop_assert_eq!(handle, expected);
                    live.insert(handle, value);
                    order.push(handle);
                }
                Op::Release(n) => {
                    if order.is_empty() {
                        continue;
                    }
                    let handle = order.remove(n % order.len());
                    let value = live.remove(&handle).unwrap();
                    prop_assert_eq!(table.release(handle), Ok(value));
                    released.push_back(handle);
                    ever_released.push(handle);
                }
                Op::ReleaseStale(n) => {
                    if ever_released.is_empty() {
                        continue;
                    }
                    let handle = ever_released[n % ever_released.len()];
                    if live.contains_key(&handle) {
                        continue;
                    }
                    prop_assert_eq!(
                        table.release(handle),
                        Err(BridgeError::DoubleRelease(handle.as_raw()))
                    );
                }
            }

            prop_assert!(table.len() >= table.next_id() as usize);
            prop_assert_eq!(table.next_id(), next_id);
            prop_assert_eq!(table.live_count(), live.len());
            prop_assert_eq!(table.free_count(), released.len());
        }

        for (handle, value) in &live {
            prop_assert_eq!(table.get(*handle), Ok(value));
        }
        for handle in &released {
            prop_assert_eq!(table.get(*handle), Err(BridgeError::InvalidHandle(handle.as_raw())));
        }
        prop_assert_eq!(table.get(Handle::NULL), Err(BridgeError::InvalidHandle(0)));
    }

    /// A released handle comes back before any handle past `next_id` at
    /// release time is minted.
    #[test]
    fn prop_released_handle_reissued_first(count in 1usize..50, pick in any::<usize>()) {
        let mut table = ResourceTable::new();
        let handles: Vec<Handle> = (0..count).map(|i| table.add(i).unwrap()).collect();
        let victim = handles[pick % count];
        let next_at_release = table.next_id();
        table.release(victim).unwrap();

        let reissued = table.add(usize::MAX).unwrap();
        prop_assert_eq!(reissued, victim);
        prop_assert!(reissued.as_raw() < next_at_release);
        prop_assert_eq!(table.add(0).unwrap(), Handle::from_raw(next_at_release));
    }
}

#[test]
fn scenario_reuse_keeps_other_handles() {
    let mut table = ResourceTable::new();
    let a = table.add("A").unwrap();
    let b = table.add("B").unwrap();
    assert_eq!(a, Handle::from_raw(1));
    assert_eq!(b, Handle::from_raw(2));

    table.release(a).unwrap();
    let c = table.add("C").unwrap();
    assert_eq!(c, Handle::from_raw(1));
    assert_eq!(table.get(Handle::from_raw(2)), Ok(&"B"));
    assert_eq!(table.get(Handle::from_raw(1)), Ok(&"C"));
}

#[test]
fn scenario_lookup_on_empty_table() {
    let table: ResourceTable<String> = ResourceTable::new();
    assert_eq!(
        table.get(Handle::from_raw(99)),
        Err(BridgeError::InvalidHandle(99))
    );
}
