use crate::constants::{
    INNER_RADIUS_MILES, MID_MAX_YEARS_EXCLUSIVE, MID_MIN_YEARS, PRE_MAX_YEARS, PRE_MIN_YEARS,
};
use crate::types::{CohortGroup, Grouping, MatchedSale};

/// Timing of a sale relative to the nearest unit's establishment year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    Pre,
    Mid,
    Post,
    Unplaced,
}

fn timing(sale_year: i32, housing_year: i32) -> Timing {
    let lead = housing_year - sale_year;
    if (PRE_MIN_YEARS..=PRE_MAX_YEARS).contains(&lead) {
        Timing::Pre
    } else if (MID_MIN_YEARS..MID_MAX_YEARS_EXCLUSIVE).contains(&lead) {
        Timing::Mid
    } else if sale_year - housing_year > 0 {
        Timing::Post
    } else {
        Timing::Unplaced
    }
}

/// Inside-only grouping: a single `outside` ring between the inner radius and
/// `outer_radius_miles`.
///
/// Anything beyond the outer radius, or a NaN distance, is `other`. The
/// runner passes the distance filter's limit as the outer radius.
pub fn classify_inside_only(
    distance_miles: f64,
    sale_year: i32,
    housing_year: i32,
    outer_radius_miles: f64,
) -> CohortGroup {
    if !(distance_miles <= outer_radius_miles) {
        return CohortGroup::Other;
    }
    if distance_miles > INNER_RADIUS_MILES {
        return CohortGroup::Outside;
    }
    match timing(sale_year, housing_year) {
        Timing::Pre => CohortGroup::Pre,
        Timing::Mid => CohortGroup::Mid,
        Timing::Post => CohortGroup::Post,
        Timing::Unplaced => CohortGroup::Other,
    }
}

/// Full grouping: the outer ring carries its own pre/mid/post split
pub fn classify_full(distance_miles: f64, sale_year: i32, housing_year: i32) -> CohortGroup {
    let inner = distance_miles <= INNER_RADIUS_MILES;
    let outer = distance_miles > INNER_RADIUS_MILES;
    match (timing(sale_year, housing_year), inner, outer) {
        (Timing::Pre, true, _) => CohortGroup::Pre,
        (Timing::Mid, true, _) => CohortGroup::Mid,
        (Timing::Post, true, _) => CohortGroup::Post,
        (Timing::Pre, _, true) => CohortGroup::OutsidePre,
        (Timing::Mid, _, true) => CohortGroup::OutsideMid,
        (Timing::Post, _, true) => CohortGroup::OutsidePost,
        _ => CohortGroup::Other,
    }
}

pub fn classify(
    grouping: Grouping,
    distance_miles: f64,
    sale_year: i32,
    housing_year: i32,
    outer_radius_miles: f64,
) -> CohortGroup {
    match grouping {
        Grouping::InsideOnly => classify_inside_only(distance_miles, sale_year, housing_year, outer_radius_miles),
        Grouping::Full => classify_full(distance_miles, sale_year, housing_year),
    }
}

/// Relabel every matched sale under `grouping`, returning a fresh table
pub fn assign_groups(matched: &[MatchedSale], grouping: Grouping, outer_radius_miles: f64) -> Vec<MatchedSale> {
    matched
        .iter()
        .map(|m| MatchedSale {
            group: classify(
                grouping,
                m.distance_miles,
                m.sale.sale_year,
                m.housing.year,
                outer_radius_miles,
            ),
            ..m.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OUTER_RADIUS_MILES as OUTER;

    #[test]
    fn test_pre_window_is_inclusive_on_both_ends() {
        assert_eq!(classify_inside_only(0.3, 2010, 2012, OUTER), CohortGroup::Pre);
        assert_eq!(classify_inside_only(0.3, 2010, 2015, OUTER), CohortGroup::Pre);
        assert_eq!(classify_inside_only(0.3, 2010, 2016, OUTER), CohortGroup::Other);
    }

    #[test]
    fn test_same_year_is_mid_not_post() {
        assert_eq!(classify_inside_only(0.1, 2010, 2010, OUTER), CohortGroup::Mid);
        assert_eq!(classify_inside_only(0.1, 2010, 2011, OUTER), CohortGroup::Mid);
        assert_eq!(classify_full(0.1, 2010, 2010), CohortGroup::Mid);
        assert_eq!(classify_full(0.9, 2010, 2010), CohortGroup::OutsideMid);
    }

    #[test]
    fn test_sale_after_housing_is_post() {
        assert_eq!(classify_inside_only(0.5, 2011, 2010, OUTER), CohortGroup::Post);
        assert_eq!(classify_full(0.5, 2020, 2010), CohortGroup::Post);
        assert_eq!(classify_full(0.75, 2011, 2010), CohortGroup::OutsidePost);
    }

    #[test]
    fn test_inner_radius_boundary() {
        assert_eq!(classify_inside_only(0.5, 2010, 2013, OUTER), CohortGroup::Pre);
        assert_eq!(classify_inside_only(0.500001, 2010, 2013, OUTER), CohortGroup::Outside);
        assert_eq!(classify_full(0.500001, 2010, 2013), CohortGroup::OutsidePre);
    }

    #[test]
    fn test_outside_ignores_timing_in_inside_only_grouping() {
        assert_eq!(classify_inside_only(0.8, 2010, 2030, OUTER), CohortGroup::Outside);
        assert_eq!(classify_inside_only(1.0, 2000, 2010, OUTER), CohortGroup::Outside);
        assert_eq!(classify_full(0.8, 2010, 2030), CohortGroup::Other);
    }

    #[test]
    fn test_beyond_outer_radius_is_other_for_inside_only() {
        assert_eq!(classify_inside_only(1.01, 2010, 2012, OUTER), CohortGroup::Other);
        assert_eq!(classify_full(1.01, 2010, 2012), CohortGroup::OutsidePre);
        assert_eq!(classify_inside_only(f64::NAN, 2010, 2012, OUTER), CohortGroup::Other);
        assert_eq!(classify_full(f64::NAN, 2010, 2012), CohortGroup::Other);
    }

    #[test]
    fn test_classification_is_pure() {
        for distance in [0.0, 0.25, 0.5, 0.75, 1.0, 1.5] {
            for gap in -7..=7 {
                let a = classify(Grouping::Full, distance, 2010, 2010 + gap, OUTER);
                let b = classify(Grouping::Full, distance, 2010, 2010 + gap, OUTER);
                assert_eq!(a, b);
                assert!(a == CohortGroup::Other || Grouping::Full.levels().contains(&a));
                let c = classify(Grouping::InsideOnly, distance, 2010, 2010 + gap, OUTER);
                assert!(c == CohortGroup::Other || Grouping::InsideOnly.levels().contains(&c));
            }
        }
    }

    #[test]
    fn test_outer_radius_follows_distance_limit() {
        assert_eq!(classify(Grouping::InsideOnly, 1.5, 2010, 2012, OUTER), CohortGroup::Other);
        assert_eq!(classify(Grouping::InsideOnly, 1.5, 2010, 2012, 2.0), CohortGroup::Outside);
        assert_eq!(classify(Grouping::InsideOnly, 2.5, 2010, 2012, 2.0), CohortGroup::Other);
        assert_eq!(classify(Grouping::Full, 1.5, 2010, 2012, 2.0), CohortGroup::OutsidePre);
        assert_eq!(classify(Grouping::InsideOnly, 0.4, 2010, 2012, 2.0), CohortGroup::Pre);
    }
}
