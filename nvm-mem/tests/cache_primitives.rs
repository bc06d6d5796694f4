//! Cache-control primitives over mapped regions.

use nvm_mem::{
    CacheBackend, FlushKind, MemoryConfig, PrefetchLocality, Region, RegionMapper, cache,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn checksum(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn patterned_region(size: usize) -> (TempDir, Region) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut region = RegionMapper::new(MemoryConfig::default())
        .expect("valid config")
        .map(dir.path(), "primitives", size)
        .expect("map region");
    for (i, b) in region.as_mut_slice().iter_mut().enumerate() {
        *b = (i * 7 % 256) as u8;
    }
    (dir, region)
}

#[test]
fn test_flush_is_idempotent() {
    let (_dir, region) = patterned_region(16 << 10);
    let before = checksum(region.as_slice());

    region.flush_all();
    region.flush_all();
    region.flush(13, 1000).expect("flush");
    region.flush(13, 1000).expect("flush");

    assert_eq!(checksum(region.as_slice()), before);
}

#[test]
fn test_flush_every_configured_kind() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    for flush in [FlushKind::Auto, FlushKind::Writeback, FlushKind::WritebackInvalidate] {
        let mapper = RegionMapper::new(MemoryConfig {
            flush,
            ..MemoryConfig::default()
        })
        .expect("valid config");
        let mut region = mapper.map(dir.path(), "kinds", 4096).expect("map region");
        region.as_mut_slice().fill(0x3C);
        region.flush_all();

        let on_disk = std::fs::read(region.path()).expect("read backing file");
        assert!(on_disk[region.offset()..].iter().all(|&b| b == 0x3C));
    }
}

#[test]
fn test_write_nt_then_fence() {
    let (_dir, mut region) = patterned_region(64 << 10);
    let src: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();

    region.write_nt(5, &src).expect("stream");
    region.fence();
    region.flush(5, src.len()).expect("flush");

    assert_eq!(&region.as_slice()[5..5 + src.len()], &src[..]);
    // bytes around the written range keep the pattern
    assert_eq!(region.as_slice()[4], 28);
    let after = 5 + src.len();
    assert_eq!(region.as_slice()[after], (after * 7 % 256) as u8);
}

#[test]
fn test_process_wide_shorthands_on_region() {
    let (_dir, mut region) = patterned_region(8192);
    let src = vec![0xEEu8; 1000];

    cache::write_nt_slice(&mut region.as_mut_slice()[100..1100], &src);
    cache::fence();
    cache::flush_slice(&region.as_slice()[100..1100]);
    cache::prefetch_slice(region.as_slice());
    cache::pause();

    assert!(region.as_slice()[100..1100].iter().all(|&b| b == 0xEE));
    assert_eq!(CacheBackend::detected().to_string().split('/').count(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_prefetch_preserves_contents(
        ranges in prop::collection::vec((0usize..32 << 10, 0usize..8 << 10), 1..16),
        locality in prop_oneof![
            Just(PrefetchLocality::T0),
            Just(PrefetchLocality::T1),
            Just(PrefetchLocality::T2),
            Just(PrefetchLocality::Nta),
        ],
    ) {
        let (_dir, region) = patterned_region(40 << 10);
        let before = checksum(region.as_slice());
        let backend = CacheBackend::detect(FlushKind::Auto, locality);

        for (offset, len) in ranges {
            let len = len.min(region.len() - offset);
            region.prefetch(offset, len).expect("in bounds");
            backend.prefetch(region.as_ptr().wrapping_add(offset), len);
        }

        prop_assert_eq!(checksum(region.as_slice()), before);
    }
}
