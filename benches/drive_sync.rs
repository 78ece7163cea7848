//! Benchmark for drive record synchronization
//!
//! Target: one 64-drive inventory pass well under the discover interval

use async_trait::async_trait;
use baremetal_node_controller::domain::ports::{
    BlockDevice, BlockDeviceLister, DataDiscoverer, DiscoverResult, DriveDescriptor,
    InventorySource, LvmOps,
};
use baremetal_node_controller::controller::LogRecorder;
use baremetal_node_controller::{
    Collaborators, ControllerConfig, ControllerMetrics, DriveStatus, DriveType, Health,
    MemoryStore, ProvisionerRegistry, Result, VolumeManager,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

struct NoopHost;

#[async_trait]
impl InventorySource for NoopHost {
    async fn list_drives(&self, _node_id: &str) -> Result<Vec<DriveDescriptor>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl BlockDeviceLister for NoopHost {
    async fn list_block_devices(&self, path: &str) -> Result<Vec<BlockDevice>> {
        Ok(vec![BlockDevice {
            name: path.to_string(),
            device_type: "disk".into(),
            ..Default::default()
        }])
    }
}

#[async_trait]
impl DataDiscoverer for NoopHost {
    async fn discover_data(&self, _path: &str, _serial: &str) -> Result<DiscoverResult> {
        Ok(DiscoverResult::default())
    }
}

#[async_trait]
impl LvmOps for NoopHost {
    async fn list_physical_volumes(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn volume_group_of(&self, _pv: &str) -> Result<String> {
        Ok(String::new())
    }
    async fn free_space(&self, _vg: &str) -> Result<u64> {
        Ok(0)
    }
    async fn logical_volumes_in(&self, _vg: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn create_lv(&self, _vg: &str, _name: &str, _size: u64) -> Result<()> {
        Ok(())
    }
    async fn remove_lv(&self, _vg: &str, _name: &str) -> Result<()> {
        Ok(())
    }
    async fn expand_lv(&self, _path: &str, _size: u64) -> Result<()> {
        Ok(())
    }
}

fn manager() -> VolumeManager<MemoryStore> {
    let host = Arc::new(NoopHost);
    let config = ControllerConfig {
        node_id: "bench-node".into(),
        namespace: "bench".into(),
        discover_system_lvg: false,
        ..Default::default()
    };
    let collaborators = Collaborators {
        inventory: host.clone(),
        lister: host.clone(),
        data_discoverer: host.clone(),
        lvm: host,
        recorder: Arc::new(LogRecorder),
        metrics: Arc::new(ControllerMetrics::new().unwrap()),
    };
    VolumeManager::new(
        config,
        Arc::new(MemoryStore::new("bench")),
        ProvisionerRegistry::default(),
        collaborators,
    )
}

fn inventory(count: usize, health: Health) -> Vec<DriveDescriptor> {
    (0..count)
        .map(|i| DriveDescriptor {
            uuid: None,
            serial_number: format!("SN-{:04}", i),
            size: 4_000_000_000_000,
            drive_type: DriveType::Hdd,
            path: format!("/dev/sd{}", i),
            status: DriveStatus::Online,
            health,
            is_system: false,
        })
        .collect()
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("drive_sync");
    group.throughput(Throughput::Elements(64));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let manager = manager();
    let drives = inventory(64, Health::Good);
    rt.block_on(manager.update_drives_crs(&drives)).unwrap();

    group.bench_function("unchanged_64_drives", |b| {
        b.to_async(&rt)
            .iter(|| async { manager.update_drives_crs(black_box(&drives)).await.unwrap() });
    });

    group.finish();
}

fn bench_health_flip(c: &mut Criterion) {
    let mut group = c.benchmark_group("drive_sync");
    group.throughput(Throughput::Elements(64));

    let rt = tokio::runtime::Runtime::new().unwrap();
    let manager = manager();
    let good = inventory(64, Health::Good);
    let bad = inventory(64, Health::Bad);
    rt.block_on(manager.update_drives_crs(&good)).unwrap();

    let mut flip = false;
    group.bench_function("health_change_64_drives", |b| {
        b.iter(|| {
            flip = !flip;
            let snapshot = if flip { &bad } else { &good };
            rt.block_on(manager.update_drives_crs(black_box(snapshot)))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_discover(c: &mut Criterion) {
    let mut group = c.benchmark_group("discover");

    let rt = tokio::runtime::Runtime::new().unwrap();
    let manager = manager();

    group.bench_function("empty_inventory_pass", |b| {
        b.to_async(&rt).iter(|| async { manager.discover().await.unwrap() });
    });

    group.finish();
}

criterion_group!(benches, bench_steady_state, bench_health_flip, bench_discover);
criterion_main!(benches);
