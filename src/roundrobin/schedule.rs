// src/roundrobin/schedule.rs

/// One scheduled turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Zero-based index over the turns actually handed out.
    pub index: u32,
    pub round: u32,
    pub seat: usize,
}

/// Hands out turns seat by seat, round by round, skipping benched seats.
#[derive(Debug)]
pub struct TurnScheduler {
    rounds: u32,
    rotate_opening: bool,
    benched: Vec<bool>,
    round: u32,
    /// Position within the current round, 0..seats.
    offset: usize,
    issued: u32,
}

impl TurnScheduler {
    pub fn new(seats: usize, rounds: u32, rotate_opening: bool) -> Self {
        Self {
            rounds,
            rotate_opening,
            benched: vec![false; seats],
            round: 0,
            offset: 0,
            issued: 0,
        }
    }

    pub fn seats(&self) -> usize {
        self.benched.len()
    }

    pub fn bench(&mut self, seat: usize) {
        if let Some(flag) = self.benched.get_mut(seat) {
            *flag = true;
        }
    }

    pub fn is_benched(&self, seat: usize) -> bool {
        self.benched.get(seat).copied().unwrap_or(true)
    }

    pub fn active_seats(&self) -> usize {
        self.benched.iter().filter(|b| !**b).count()
    }

    /// True once every seat has been benched.
    pub fn exhausted(&self) -> bool {
        self.active_seats() == 0
    }

    fn opening_seat(&self, round: u32) -> usize {
        if self.rotate_opening {
            round as usize % self.seats()
        } else {
            0
        }
    }

    pub fn next_slot(&mut self) -> Option<Slot> {
        if self.seats() == 0 || self.exhausted() {
            return None;
        }

        while self.round < self.rounds {
            if self.offset >= self.seats() {
                self.round += 1;
                self.offset = 0;
                continue;
            }

            let seat = (self.opening_seat(self.round) + self.offset) % self.seats();
            self.offset += 1;

            if self.benched[seat] {
                continue;
            }

            let slot = Slot {
                index: self.issued,
                round: self.round,
                seat,
            };
            self.issued += 1;
            return Some(slot);
        }

        None
    }
}
