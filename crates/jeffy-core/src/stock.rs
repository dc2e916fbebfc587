//! Splitting scarce central stock across franchise requests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    /// Caller-defined identifier, usually a `stock_order_items.id`.
    pub key: i64,
    pub requested: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAllocation {
    pub key: i64,
    pub requested: u32,
    pub allocated: u32,
}

/// Allocates `available` units across `requests`.
///
/// When supply covers demand every request is filled in full. Otherwise each
/// request receives its proportional share rounded down, and the units lost to
/// rounding go one at a time to the requests with the largest fractional
/// remainder (earlier requests win ties). No request is ever over-filled and
/// the allocated total equals `min(available, total requested)`.
#[must_use]
pub fn allocate_stock(available: u32, requests: &[StockRequest]) -> Vec<StockAllocation> {
    let total_requested: u64 = requests.iter().map(|r| u64::from(r.requested)).sum();

    let shares = if u64::from(available) >= total_requested {
        requests.iter().map(|r| u64::from(r.requested)).collect()
    } else {
        let weights: Vec<u64> = requests.iter().map(|r| u64::from(r.requested)).collect();
        apportion(u64::from(available), &weights)
    };

    requests
        .iter()
        .zip(shares)
        .map(|(request, share)| StockAllocation {
            key: request.key,
            requested: request.requested,
            // share <= requested, which already fits in u32
            allocated: u32::try_from(share).unwrap_or(request.requested),
        })
        .collect()
}

/// Largest-remainder apportionment of `total` units by `weights`.
///
/// Returns all zeros when the weights sum to zero.
pub(crate) fn apportion(total: u64, weights: &[u64]) -> Vec<u64> {
    let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }

    let total_wide = u128::from(total);
    let mut shares = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());

    for (idx, weight) in weights.iter().enumerate() {
        let scaled = total_wide * u128::from(*weight);
        shares.push(scaled / weight_sum);
        remainders.push((scaled % weight_sum, idx));
    }

    let assigned: u128 = shares.iter().sum();
    let leftover = usize::try_from(total_wide - assigned).unwrap_or(usize::MAX);

    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in remainders.into_iter().take(leftover) {
        shares[idx] += 1;
    }

    shares
        .into_iter()
        .map(|s| u64::try_from(s).unwrap_or(u64::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(key: i64, requested: u32) -> StockRequest {
        StockRequest { key, requested }
    }

    fn allocated(allocs: &[StockAllocation]) -> Vec<u32> {
        allocs.iter().map(|a| a.allocated).collect()
    }

    #[test]
    fn fills_everything_when_supply_covers_demand() {
        let allocs = allocate_stock(100, &[req(1, 10), req(2, 30)]);
        assert_eq!(allocated(&allocs), vec![10, 30]);
    }

    #[test]
    fn splits_proportionally_when_short() {
        let allocs = allocate_stock(50, &[req(1, 60), req(2, 40)]);
        assert_eq!(allocated(&allocs), vec![30, 20]);
    }

    #[test]
    fn leftover_units_go_to_largest_remainders() {
        // 10 units over 3 equal requests: 3/3/3 plus one leftover to the first.
        let allocs = allocate_stock(10, &[req(1, 7), req(2, 7), req(3, 7)]);
        assert_eq!(allocated(&allocs), vec![4, 3, 3]);

        // 5 units over 5 and 2: exact shares 3.57 and 1.43.
        let allocs = allocate_stock(5, &[req(1, 5), req(2, 2)]);
        assert_eq!(allocated(&allocs), vec![4, 1]);
    }

    #[test]
    fn never_overfills_and_sums_to_available() {
        let requests = [req(1, 1), req(2, 13), req(3, 2), req(4, 9), req(5, 0)];
        let allocs = allocate_stock(17, &requests);
        let total: u32 = allocs.iter().map(|a| a.allocated).sum();
        assert_eq!(total, 17);
        for a in &allocs {
            assert!(a.allocated <= a.requested, "{a:?} over-filled");
        }
        assert_eq!(allocs[4].allocated, 0);
    }

    #[test]
    fn zero_available_allocates_nothing() {
        let allocs = allocate_stock(0, &[req(1, 3), req(2, 4)]);
        assert_eq!(allocated(&allocs), vec![0, 0]);
    }

    #[test]
    fn empty_requests_yield_empty_allocation() {
        assert!(allocate_stock(10, &[]).is_empty());
    }

    #[test]
    fn apportion_zero_weights() {
        assert_eq!(apportion(10, &[0, 0]), vec![0, 0]);
    }
}
