mod common;

use common::{DbBuilder, Region, key};
use czdb_search::{NullObserver, OpenOptions};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// Sorted, disjoint `(start, end)` ranges built from gap/length pairs.
fn ranges() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..5000, 0u32..5000), 1..40).prop_map(|steps| {
        let mut out = Vec::new();
        let mut next = 1u32;
        for (gap, len) in steps {
            let start = next + gap;
            let end = start + len;
            out.push((start, end));
            next = end + 1;
        }
        out
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn lookups_match_linear_scan(
        ranges in ranges(),
        per_block in 1usize..6,
        probes in prop::collection::vec(0u32..250_000, 1..50),
    ) {
        let mut builder = DbBuilder::ipv4().records_per_block(per_block);
        for (i, (start, end)) in ranges.iter().enumerate() {
            builder = builder.raw_range(
                start.to_be_bytes().to_vec(),
                end.to_be_bytes().to_vec(),
                Region::plain(&format!("r{i}")),
            );
        }
        let mut options = OpenOptions::new();
        options.observer(Arc::new(NullObserver));
        let searcher = options.open_bytes(builder.build(), &key()).unwrap();

        let boundaries = ranges.iter().flat_map(|&(s, e)| [s, e, s.saturating_sub(1), e + 1]);
        for ip in probes.into_iter().chain(boundaries) {
            let expected = ranges
                .iter()
                .position(|&(s, e)| s <= ip && ip <= e)
                .map(|i| format!("r{i}"));
            let found = searcher.lookup(IpAddr::V4(Ipv4Addr::from(ip))).unwrap();
            prop_assert_eq!(found, expected, "ip {}", Ipv4Addr::from(ip));
        }
    }
}
