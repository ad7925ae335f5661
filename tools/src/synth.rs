//! Seeded synthetic fleet for demos and smoke runs.
//!
//! RULE: Same seed, same `today`, same fleet. All randomness comes from
//! one `Pcg64Mcg` stream per concern, derived from the master seed, so
//! adding a new concern never shifts the existing ones.

use chrono::{Duration, NaiveDate};
use fleetscore_core::{
    clock::{pay_date_from_window, PayDelay, PayrollClock, PayrollWindow},
    event::{DispatcherEvent, DispatcherEventKind},
    records::{ContractStatusRecord, LiveLoad, LoadStatus, PayStub, RosterEntry, WellnessOutcome},
    snapshot::FleetSnapshot,
    types::{ContractType, RetentionStatus},
};
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const TEAMS: &[&str] = &["North", "South", "West"];
const COMPANIES: &[&str] = &["Redline Freight", "Blue Ox Logistics"];
const FIRST_NAMES: &[&str] = &[
    "Ava", "Ben", "Carla", "Dmitri", "Elena", "Farid", "Grace", "Hector", "Ines", "Jamal",
    "Keiko", "Luis", "Maya", "Nikolai", "Olga", "Pedro", "Quinn", "Rosa", "Samir", "Tanya",
];
const LAST_NAMES: &[&str] = &[
    "Alvarez", "Brooks", "Chen", "Dubois", "Evans", "Fischer", "Garcia", "Hughes", "Ivanov",
    "Jensen", "Kowalski", "Lopez", "Morgan", "Novak", "Okafor", "Patel", "Reyes", "Silva",
];

/// Weeks of settled history generated before the live week.
const HISTORY_WEEKS: i64 = 26;

#[derive(Clone, Copy)]
enum Stream {
    Roster,
    Stubs,
    Loads,
    Events,
}

/// A deterministic draw source for one concern.
struct SynthRng {
    inner: Pcg64Mcg,
}

impl SynthRng {
    fn new(master_seed: u64, stream: Stream) -> Self {
        let index = stream as u64 + 1;
        let derived = master_seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { inner: Pcg64Mcg::seed_from_u64(derived) }
    }

    /// Uniform in [0.0, 1.0).
    fn next_f64(&mut self) -> f64 {
        (self.inner.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.inner.next_u64() % n.max(1) as u64) as usize
    }

    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

struct Desk {
    dispatcher: String,
    team:       &'static str,
}

struct DriverPlan {
    id:       String,
    contract: ContractType,
    company:  &'static str,
    desk:     usize,
    /// Weeks ago of the first stub.
    start:    i64,
}

pub fn generate_fleet(seed: u64, drivers: usize, today: NaiveDate) -> FleetSnapshot {
    let clock = PayrollClock::new(today);
    let live = clock.live_window();
    let mut roster_rng = SynthRng::new(seed, Stream::Roster);
    let mut stub_rng = SynthRng::new(seed, Stream::Stubs);
    let mut load_rng = SynthRng::new(seed, Stream::Loads);
    let mut event_rng = SynthRng::new(seed, Stream::Events);

    let desks: Vec<Desk> = TEAMS
        .iter()
        .flat_map(|team| (0..2).map(move |_| *team))
        .map(|team| Desk {
            dispatcher: format!(
                "{} {}",
                roster_rng.pick(FIRST_NAMES),
                roster_rng.pick(LAST_NAMES)
            ),
            team,
        })
        .collect();

    let plans: Vec<DriverPlan> = (0..drivers)
        .map(|i| DriverPlan {
            id:       format!("DRV-{:04}", i + 1),
            contract: if roster_rng.chance(0.4) {
                ContractType::OwnerOperator
            } else {
                ContractType::LeaseOwnerOperator
            },
            company:  if roster_rng.chance(0.7) { COMPANIES[0] } else { COMPANIES[1] },
            desk:     roster_rng.below(desks.len()),
            start:    1 + roster_rng.below(HISTORY_WEEKS as usize) as i64,
        })
        .collect();

    let mut snapshot = FleetSnapshot::default();

    for plan in &plans {
        let mut desk = plan.desk;
        let mut terminated = false;

        for weeks_ago in (1..=plan.start).rev() {
            let window = live.shifted(-weeks_ago);
            if stub_rng.chance(0.03) {
                desk = stub_rng.below(desks.len());
            }
            let status = if weeks_ago == plan.start {
                RetentionStatus::Start
            } else if stub_rng.chance(0.015) {
                terminated = true;
                RetentionStatus::Terminated
            } else {
                RetentionStatus::Active
            };
            if !terminated && !stub_rng.chance(0.9) {
                continue;
            }

            let Ok(pay_date) = pay_date_from_window(&window, PayDelay::Standard) else {
                continue;
            };
            let miles = stub_rng.range(1_200.0, 3_000.0);
            let gross = miles * stub_rng.range(1.5, 2.6);
            let mut stub = PayStub::new(plan.id.clone(), pay_date, desks[desk].dispatcher.clone())
                .with_status(status)
                .with_contract(plan.contract)
                .with_team(desks[desk].team)
                .with_company(plan.company)
                .with_pay(miles, gross, gross * stub_rng.range(0.2, 0.45))
                .with_margin(gross * 0.1)
                .with_tolls(stub_rng.range(0.0, 180.0))
                .with_po(stub_rng.range(0.0, 800.0), 0.0);
            if stub_rng.chance(0.2) {
                stub = stub.with_balance(-stub_rng.range(100.0, 4_000.0), 0.0);
            }
            snapshot.stubs.push(stub);

            push_loads(&mut snapshot, &mut load_rng, plan, &desks[desk], window);
            if terminated {
                break;
            }
        }

        snapshot.contract_statuses.push(ContractStatusRecord {
            driver: plan.id.clone(),
            status: if terminated { RetentionStatus::Terminated } else { RetentionStatus::Active },
            as_of:  Some(today),
        });
        if !terminated {
            push_loads(&mut snapshot, &mut load_rng, plan, &desks[desk], live);
            snapshot.roster.push(RosterEntry {
                driver:        plan.id.clone(),
                dispatcher:    Some(desks[desk].dispatcher.clone()),
                team:          Some(desks[desk].team.to_string()),
                company:       Some(plan.company.to_string()),
                franchise:     None,
                contract_type: plan.contract,
            });
        }
    }

    for desk in &desks {
        for weeks_ago in 0..=HISTORY_WEEKS {
            let window = live.shifted(-weeks_ago);
            push_events(&mut snapshot, &mut event_rng, &desk.dispatcher, window);
        }
    }

    log::info!(
        "generated fleet seed={seed}: {} stubs, {} loads, {} events across {} dispatchers",
        snapshot.stubs.len(),
        snapshot.loads.len(),
        snapshot.events.len(),
        desks.len(),
    );
    snapshot
}

fn push_loads(
    snapshot: &mut FleetSnapshot,
    rng: &mut SynthRng,
    plan: &DriverPlan,
    desk: &Desk,
    window: PayrollWindow,
) {
    for _ in 0..1 + rng.below(3) {
        let pickup = window.start + Duration::days(rng.below(7) as i64);
        let trip = rng.range(300.0, 1_400.0);
        let deadhead = rng.range(0.0, 200.0);
        let status = match rng.below(20) {
            0 => LoadStatus::Canceled,
            1 => LoadStatus::Tonu,
            2..=9 => LoadStatus::InTransit,
            _ => LoadStatus::Delivered,
        };
        let mut load = LiveLoad::new(plan.id.clone(), desk.dispatcher.clone(), pickup)
            .with_status(status)
            .with_contract(plan.contract)
            .with_team(desk.team)
            .with_trip(trip * rng.range(1.4, 3.0), trip, deadhead)
            .with_weight(rng.range(18_000.0, 45_000.0));
        load.cut = load.price * 0.1;
        load.company = Some(plan.company.to_string());
        if rng.chance(0.6) {
            let outcome = if rng.chance(0.85) { WellnessOutcome::Pass } else { WellnessOutcome::Fail };
            load = load.with_wellness(outcome);
        }
        if rng.chance(0.05) {
            load = load.moved();
        }
        if rng.chance(0.04) {
            load = load.with_hidden_miles();
        }
        snapshot.loads.push(load);
    }
}

fn push_events(snapshot: &mut FleetSnapshot, rng: &mut SynthRng, dispatcher: &str, window: PayrollWindow) {
    let mut push = |rng: &mut SynthRng, kind: DispatcherEventKind| {
        let date = window.start + Duration::days(rng.below(7) as i64);
        snapshot.events.push(DispatcherEvent::new(dispatcher, date, kind));
    };

    if rng.chance(0.3) {
        let days = 1.0 + rng.below(4) as f64;
        push(rng, DispatcherEventKind::OverdueLoad { days });
    }
    if rng.chance(0.2) {
        push(rng, DispatcherEventKind::TuesdayOpen);
    }
    if rng.chance(0.25) {
        push(rng, DispatcherEventKind::MissingPaperwork);
    }
    if rng.chance(0.15) {
        push(rng, DispatcherEventKind::TrailerDrop);
    }
    if rng.chance(0.1) {
        push(rng, DispatcherEventKind::TrailerRecovery);
    }
    let minutes = rng.range(10.0, 240.0);
    push(rng, DispatcherEventKind::CalculatorUsage { minutes });
    for _ in 0..rng.below(4) {
        let minutes = rng.range(2.0, 45.0);
        push(rng, DispatcherEventKind::RcEntry { minutes });
    }
}
