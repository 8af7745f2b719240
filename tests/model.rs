/*
 * Copyright 2021 Luca Fulchir <luker@fenrirproject.org>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Long random runs against a naive model built on std collections

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shardcache::clock::ManualClock;
use shardcache::lru::LRU;
use shardcache::timer::TimerQueue;
use std::collections::VecDeque;

/// Naive LRU: a deque of (key, value), front is the least recent
struct ModelLru {
    entries: VecDeque<(u32, u32)>,
    capacity: usize,
}

impl ModelLru {
    fn position(&self, key: u32) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }
    fn put(&mut self, key: u32, val: u32) -> Option<(u32, u32)> {
        if let Some(pos) = self.position(key) {
            self.entries.remove(pos);
            self.entries.push_back((key, val));
            return None;
        }
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back((key, val));
        evicted
    }
    fn refresh(&mut self, key: u32) -> Option<u32> {
        let pos = self.position(key)?;
        let entry = self.entries.remove(pos)?;
        self.entries.push_back(entry);
        Some(entry.1)
    }
    fn remove(&mut self, key: u32) -> Option<u32> {
        let pos = self.position(key)?;
        self.entries.remove(pos).map(|(_, v)| v)
    }
}

#[test]
fn lru_matches_model() {
    let capacity = 32;
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut lru = LRU::<u32, u32>::new(capacity).unwrap();
    let mut model = ModelLru {
        entries: VecDeque::new(),
        capacity,
    };
    for round in 0..20_000 {
        let key = rng.gen_range(0..96);
        match rng.gen_range(0..10) {
            0..=4 => {
                let val = rng.gen();
                let evicted = model.put(key, val);
                let got = match lru.insert(key, val) {
                    shardcache::results::InsertResult::OldTail(k, v) => {
                        Some((k, v))
                    }
                    _ => None,
                };
                assert_eq!(got, evicted, "round {}", round);
            }
            5..=7 => {
                let expected = model.refresh(key);
                assert_eq!(lru.get_refresh(&key).copied(), expected);
            }
            8 => {
                assert_eq!(lru.remove(&key), model.remove(key));
            }
            _ => {
                let expected =
                    model.position(key).map(|pos| model.entries[pos].1);
                assert_eq!(lru.get(&key).copied(), expected);
            }
        }
        if round % 1000 == 0 {
            lru.check_invariants().unwrap();
            let order: Vec<(u32, u32)> =
                lru.iter().map(|(k, v)| (*k, *v)).collect();
            let expected: Vec<(u32, u32)> =
                model.entries.iter().copied().collect();
            assert_eq!(order, expected);
        }
    }
}

#[test]
fn timer_queue_matches_model() {
    let capacity = 16;
    let timeout = 20;
    let mut rng = StdRng::seed_from_u64(42);
    let clock = ManualClock::new(0);
    let mut queue =
        TimerQueue::<u32, u32, _>::new(capacity, clock.clone()).unwrap();
    // (key, value, stamp), oldest first
    let mut model: VecDeque<(u32, u32, u64)> = VecDeque::new();
    let mut now = 0;
    for round in 0..20_000 {
        let key = rng.gen_range(0..48);
        match rng.gen_range(0..8) {
            0..=2 => {
                let val = rng.gen();
                if let Some(pos) = model.iter().position(|e| e.0 == key) {
                    model.remove(pos);
                } else if model.len() == capacity {
                    model.pop_front();
                }
                model.push_back((key, val, now));
                queue.push_back(key, val);
            }
            3 => {
                let by = rng.gen_range(0..6);
                now += by;
                clock.advance(by);
            }
            4 | 5 => {
                let expected = match model.front() {
                    Some(&(k, v, t)) if now - t >= timeout => {
                        model.pop_front();
                        Some((k, v))
                    }
                    _ => None,
                };
                let got = queue.pop_front(timeout);
                assert_eq!(got, expected, "round {}", round);
            }
            6 => {
                let pos = model.iter().position(|e| e.0 == key);
                let expected =
                    pos.and_then(|pos| model.remove(pos)).map(|e| e.1);
                assert_eq!(queue.remove(&key), expected);
            }
            _ => {
                let mut expected = 0;
                while let Some(&(_, _, t)) = model.front() {
                    if now - t < timeout {
                        break;
                    }
                    model.pop_front();
                    expected += 1;
                }
                assert_eq!(queue.expire(timeout, |_, _| {}), expected);
            }
        }
        assert_eq!(queue.len(), model.len());
        if round % 1000 == 0 {
            queue.check_invariants().unwrap();
        }
    }
}
