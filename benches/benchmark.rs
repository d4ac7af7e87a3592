use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;

use gyrification::components::label_components_3d;
use gyrification::{
    compute_split_plane, partition_volume, PartitionOptions, RoiPolicy, RoiTable, SplitStrategy,
    VoxelVolume,
};
use gyrification::volume::tissue_masks_minimal;

/// A segmentation with two separated white matter blocks and a thin corpus
/// callosum sheet, large enough to make the labeling passes non-trivial.
fn synthetic_volume() -> VoxelVolume {
    let roi = RoiTable::default();
    let mut data = Array3::<u8>::zeros((96, 96, 96));
    for y in 20..76 {
        for z in 20..76 {
            for x in 10..40 {
                data[[x, y, z]] = roi.white_matter;
            }
            for x in 56..86 {
                data[[x, y, z]] = roi.white_matter;
            }
            data[[48, y, z]] = roi.corpus_callosum;
            data[[8, y, z]] = roi.cortical_gray_matter;
            data[[88, y, z]] = roi.cortical_gray_matter;
        }
    }
    VoxelVolume {
        origin: [0.; 3],
        data,
    }
}

fn bench_partition(c: &mut Criterion) {
    let volume = synthetic_volume();
    let masks = tissue_masks_minimal(&volume, &RoiTable::default());
    let opts = PartitionOptions {
        policy: RoiPolicy::Minimal,
        ..PartitionOptions::default()
    };

    c.bench_function("label_components_3d", |b| {
        b.iter(|| label_components_3d(black_box(&masks.white_matter)))
    });
    c.bench_function("split_plane_two_largest", |b| {
        b.iter(|| {
            compute_split_plane(black_box(&masks), SplitStrategy::TwoLargestComponents).unwrap()
        })
    });
    c.bench_function("partition_volume", |b| {
        b.iter(|| partition_volume(black_box(&volume), &opts).unwrap())
    });
}

criterion_group!(benches, bench_partition);
criterion_main!(benches);
