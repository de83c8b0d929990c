//! Pure resource and troop decisions.
//!
//! Nothing here looks at timers or talks to the game; the scheduler feeds in
//! what the executor scraped and acts on the result.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FieldId;
use crate::resources::{Resource, ResourceAmounts};
use crate::troops::{TroopCounts, UnitType};

/// Raid sizing floor: weak targets always get at least this many units.
pub const MIN_RAID_SIZE: u32 = 10;
const SMALL_TARGET_POPULATION: u32 = 20;

/// Units tried, in order, when picking one type to raid with.
pub const RAID_PRIORITY: [UnitType; 5] = [
    UnitType::T1,
    UnitType::T2,
    UnitType::T3,
    UnitType::T5,
    UnitType::T6,
];

/// Units committed in full by an offensive.
pub const OFFENSIVE_UNITS: [UnitType; 5] = [
    UnitType::T1,
    UnitType::T3,
    UnitType::T5,
    UnitType::T6,
    UnitType::T7,
];
pub const SIEGE_UNIT: UnitType = UnitType::T8;
pub const ESCORT_UNIT: UnitType = UnitType::T2;

/// Resource with the smallest stock. Ties go to the earliest resource in
/// [`Resource::ALL`].
#[must_use]
pub fn least_resource(stock: &ResourceAmounts) -> Resource {
    let mut least = Resource::ALL[0];
    for resource in Resource::ALL {
        if stock.get(resource) < stock.get(least) {
            least = resource;
        }
    }
    least
}

/// Units to send against a target of the given population.
///
/// Small targets get a fixed floor; larger ones half their population.
#[must_use]
pub const fn troop_amount_for_population(population: u32) -> u32 {
    if population <= SMALL_TARGET_POPULATION {
        MIN_RAID_SIZE
    } else {
        population / 2
    }
}

/// First unit type in [`RAID_PRIORITY`] with at least `required` available.
#[must_use]
pub fn select_raid_unit(available: &TroopCounts, required: u32) -> Option<UnitType> {
    RAID_PRIORITY
        .into_iter()
        .find(|unit| available.get(*unit) >= required)
}

/// A shipment that fills whole carriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPlan {
    pub carriers: u32,
    pub amounts: ResourceAmounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PackingError {
    #[error("carrier capacity is zero")]
    ZeroCapacity,
    #[error("no carriers available")]
    NoCarriers,
    #[error("{missing} more resources needed to fill one carrier")]
    Shortfall { missing: u64 },
}

/// Plans a shipment of whole carriers.
///
/// Buckets are filled first-fit in canonical order; later resources may get
/// nothing even when they have stock.
///
/// # Errors
///
/// Fails when not even one carrier can be filled.
pub fn pack_carriers(
    stock: &ResourceAmounts,
    capacity: u64,
    available: u32,
) -> Result<CarrierPlan, PackingError> {
    if capacity == 0 {
        return Err(PackingError::ZeroCapacity);
    }
    let total = stock.total();
    let fillable = total / capacity;
    if fillable == 0 {
        return Err(PackingError::Shortfall {
            missing: capacity - total % capacity,
        });
    }
    if available == 0 {
        return Err(PackingError::NoCarriers);
    }
    let carriers = u32::try_from(fillable).map_or(available, |full| full.min(available));

    let mut remaining = u64::from(carriers) * capacity;
    let mut amounts = ResourceAmounts::default();
    for resource in Resource::ALL {
        let take = stock.get(resource).min(remaining);
        amounts.set(resource, take);
        remaining -= take;
        if remaining == 0 {
            break;
        }
    }

    Ok(CarrierPlan { carriers, amounts })
}

/// Waves of an all-in offensive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffensivePlan {
    pub main_wave: TroopCounts,
    /// One siege unit plus escort each.
    pub follow_ups: Vec<TroopCounts>,
    /// Siege units left home because the escort could not cover them.
    pub abandoned_siege: u32,
}

impl OffensivePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.main_wave.is_empty() && self.follow_ups.is_empty()
    }

    #[must_use]
    pub fn wave_count(&self) -> usize {
        usize::from(!self.main_wave.is_empty()) + self.follow_ups.len()
    }
}

/// Commits every offensive unit plus up to `siege_cap` siege units, then
/// spreads the surplus siege units over escorted follow-ups.
///
/// Siege units never leave without escort: when the escort cannot be split
/// at least one per surplus unit, the surplus is abandoned.
#[must_use]
pub fn plan_offensive(available: &TroopCounts, siege_cap: u32) -> OffensivePlan {
    let mut main_wave: TroopCounts = OFFENSIVE_UNITS
        .into_iter()
        .map(|unit| (unit, available.get(unit)))
        .collect();

    let siege_available = available.get(SIEGE_UNIT);
    let committed = siege_available.min(siege_cap);
    main_wave.set(SIEGE_UNIT, committed);

    let remaining = siege_available - committed;
    if remaining == 0 {
        return OffensivePlan {
            main_wave,
            ..OffensivePlan::default()
        };
    }

    let escort = available.get(ESCORT_UNIT) / remaining;
    if escort == 0 {
        return OffensivePlan {
            main_wave,
            follow_ups: Vec::new(),
            abandoned_siege: remaining,
        };
    }

    let wave = TroopCounts::new()
        .with(ESCORT_UNIT, escort)
        .with(SIEGE_UNIT, 1);
    OffensivePlan {
        main_wave,
        follow_ups: vec![wave; usize::try_from(remaining).unwrap_or_default()],
        abandoned_siege: 0,
    }
}

/// A resource field or building slot as read from the village overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    pub id: FieldId,
    #[serde(default)]
    pub level: Option<u32>,
}

/// Lowest-level slot among `fields`, restricted to `preference` when given.
/// Unknown levels count as zero; ties keep page order.
#[must_use]
pub fn lowest_level_field<'a>(fields: &'a [FieldSlot], preference: &[FieldId]) -> Option<&'a FieldSlot> {
    fields
        .iter()
        .filter(|field| preference.is_empty() || preference.contains(&field.id))
        .min_by_key(|field| field.level.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_resource_prefers_canonical_order_on_ties() {
        let stock = ResourceAmounts::new(100, 50, 50, 200);
        assert_eq!(least_resource(&stock), Resource::Clay);
        let flat = ResourceAmounts::new(7, 7, 7, 7);
        assert_eq!(least_resource(&flat), Resource::Wood);
        let crop_low = ResourceAmounts::new(9, 9, 9, 1);
        assert_eq!(least_resource(&crop_low), Resource::Crop);
    }

    #[test]
    fn troop_amount_has_floor_then_halves() {
        assert_eq!(troop_amount_for_population(0), 10);
        assert_eq!(troop_amount_for_population(20), 10);
        assert_eq!(troop_amount_for_population(21), 10);
        assert_eq!(troop_amount_for_population(35), 17);
        assert_eq!(troop_amount_for_population(100), 50);
    }

    #[test]
    fn raid_unit_follows_priority() {
        let available = TroopCounts::new()
            .with(UnitType::T1, 4)
            .with(UnitType::T3, 30)
            .with(UnitType::T5, 80);
        assert_eq!(select_raid_unit(&available, 10), Some(UnitType::T3));
        assert_eq!(select_raid_unit(&available, 50), Some(UnitType::T5));
        assert_eq!(select_raid_unit(&available, 81), None);
        // t4 is a scout and never raids
        let scouts = TroopCounts::new().with(UnitType::T4, 500);
        assert_eq!(select_raid_unit(&scouts, 1), None);
    }

    #[test]
    fn packs_first_fit_up_to_full_carriers() {
        let stock = ResourceAmounts::new(400, 400, 400, 400);
        let plan = pack_carriers(&stock, 500, 3).unwrap();
        assert_eq!(plan.carriers, 3);
        assert_eq!(plan.amounts, ResourceAmounts::new(400, 400, 400, 300));
        assert_eq!(plan.amounts.total(), 1500);
    }

    #[test]
    fn packing_stops_once_capacity_is_used() {
        let stock = ResourceAmounts::new(1200, 300, 300, 300);
        let plan = pack_carriers(&stock, 500, 2).unwrap();
        assert_eq!(plan.amounts, ResourceAmounts::new(1000, 0, 0, 0));
    }

    #[test]
    fn packing_reports_shortfall() {
        let stock = ResourceAmounts::new(100, 100, 50, 0);
        assert_eq!(
            pack_carriers(&stock, 500, 5),
            Err(PackingError::Shortfall { missing: 250 })
        );
        assert_eq!(
            pack_carriers(&stock, 0, 5),
            Err(PackingError::ZeroCapacity)
        );
        let rich = ResourceAmounts::new(5000, 0, 0, 0);
        assert_eq!(pack_carriers(&rich, 500, 0), Err(PackingError::NoCarriers));
    }

    #[test]
    fn offensive_commits_everything_within_cap() {
        let available = TroopCounts::new()
            .with(UnitType::T1, 100)
            .with(UnitType::T2, 40)
            .with(UnitType::T7, 12)
            .with(UnitType::T8, 60);
        let plan = plan_offensive(&available, 100);
        assert_eq!(plan.main_wave.get(UnitType::T1), 100);
        assert_eq!(plan.main_wave.get(UnitType::T7), 12);
        assert_eq!(plan.main_wave.get(UnitType::T8), 60);
        assert_eq!(plan.main_wave.get(UnitType::T2), 0);
        assert!(plan.follow_ups.is_empty());
        assert_eq!(plan.wave_count(), 1);
    }

    #[test]
    fn offensive_spreads_surplus_siege_with_escort() {
        let available = TroopCounts::new()
            .with(UnitType::T2, 50)
            .with(UnitType::T8, 104);
        let plan = plan_offensive(&available, 100);
        assert_eq!(plan.main_wave.get(UnitType::T8), 100);
        assert_eq!(plan.follow_ups.len(), 4);
        for wave in &plan.follow_ups {
            assert_eq!(wave.get(UnitType::T2), 12);
            assert_eq!(wave.get(UnitType::T8), 1);
        }
        assert_eq!(plan.abandoned_siege, 0);
    }

    #[test]
    fn offensive_abandons_unescorted_siege() {
        let available = TroopCounts::new()
            .with(UnitType::T2, 2)
            .with(UnitType::T8, 105);
        let plan = plan_offensive(&available, 100);
        assert!(plan.follow_ups.is_empty());
        assert_eq!(plan.abandoned_siege, 5);
    }

    #[test]
    fn lowest_level_respects_preference_and_order() {
        let fields = vec![
            FieldSlot { id: FieldId(1), level: Some(3) },
            FieldSlot { id: FieldId(2), level: Some(1) },
            FieldSlot { id: FieldId(3), level: Some(1) },
            FieldSlot { id: FieldId(26), level: None },
        ];
        assert_eq!(lowest_level_field(&fields, &[]).map(|f| f.id), Some(FieldId(26)));
        let preferred = [FieldId(1), FieldId(3), FieldId(2)];
        assert_eq!(
            lowest_level_field(&fields, &preferred).map(|f| f.id),
            Some(FieldId(2))
        );
        assert_eq!(lowest_level_field(&fields, &[FieldId(40)]), None);
    }
}
