use crate::mapping::parse_date;
use crate::preview::PreviewTransaction;
use crate::transfer::TransferPair;

pub const DEFAULT_WINDOW_DAYS: i64 = 3;

/// Finds rows that look like the two sides of one internal transfer: equal,
/// non-zero amounts of opposite sign, dated at most `window_days` apart.
///
/// Each row joins at most one pair. Closer dates pair first, then earlier
/// rows. Rows with unparseable dates never pair.
pub fn detect_transfers(rows: &[PreviewTransaction], window_days: i64) -> Vec<TransferPair> {
    let dates: Vec<_> = rows.iter().map(|r| parse_date(&r.date)).collect();

    let mut candidates = Vec::new();
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            let (a, b) = (&rows[i], &rows[j]);
            if a.amount.is_zero() || a.amount != -b.amount {
                continue;
            }
            let (Some(da), Some(db)) = (dates[i], dates[j]) else {
                continue;
            };
            let gap = (da - db).num_days().abs();
            if gap <= window_days {
                candidates.push((gap, i, j));
            }
        }
    }
    candidates.sort_unstable();

    let mut used = vec![false; rows.len()];
    let mut pairs = Vec::new();
    for (_, i, j) in candidates {
        if used[i] || used[j] {
            continue;
        }
        used[i] = true;
        used[j] = true;
        pairs.push(TransferPair::new(i, j));
    }
    pairs.sort_unstable_by_key(|p| (p.i, p.j));
    pairs
}
