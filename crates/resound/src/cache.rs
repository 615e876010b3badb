//! The audio cache facade
//!
//! Ties the filesystem, the registry and the scheduler together. Every
//! shared structure is owned by an `AudioCache` instance rather than a
//! process global, so tests and hosts can run isolated caches side by side.

use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::registry::{Registry, ResourceId};
use crate::resource::{
    BankResource, BlobResource, CachedResource, DmaRequest, Resource, SampleResource,
};
use crate::scheduler::Scheduler;
use crate::strategy::{CacheStrategy, ResourceKind};
use resound_decoder::{CodecType, Metadata, open_decoder};
use resound_vfs::{ByteSource, Filesystem};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Registry, scheduler and filesystem of one cache instance.
#[derive(Debug)]
pub struct AudioCache {
    config: CacheConfig,
    filesystem: Arc<Filesystem>,
    registry: Arc<Registry>,
    scheduler: Scheduler,
}

impl AudioCache {
    /// Cache with its own filesystem and a background worker.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::with_filesystem(config, Arc::new(Filesystem::new()))
    }

    /// Cache over an existing filesystem, with a background worker.
    pub fn with_filesystem(config: CacheConfig, filesystem: Arc<Filesystem>) -> CacheResult<Self> {
        config.validate()?;
        let registry = Arc::new(Registry::new());
        let scheduler = Scheduler::start(Arc::clone(&registry), &config)?;
        Ok(Self {
            config,
            filesystem,
            registry,
            scheduler,
        })
    }

    /// Cache without a worker. Preloading and GC happen only when the host
    /// calls the scheduler's `drain_pending` and `collect_garbage`.
    pub fn manual(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let registry = Arc::new(Registry::new());
        let scheduler = Scheduler::manual(Arc::clone(&registry), &config);
        Ok(Self {
            config,
            filesystem: Arc::new(Filesystem::new()),
            registry,
            scheduler,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path resolver
    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.filesystem
    }

    /// Registered resources
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Background worker control
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Directory relative base directories are resolved against
    pub fn set_default_directory(&self, path: impl AsRef<Path>) {
        self.filesystem.set_default_dir(path);
    }

    /// Allow base directories at or below `path`
    pub fn add_allowed_directory(&self, path: impl AsRef<Path>) {
        self.filesystem.add_allowed_dir(path);
    }

    /// Treat directories with this extension as zip archives
    pub fn register_archive_extension(&self, ext: &str) {
        self.filesystem.add_archive_extension(ext);
    }

    /// Recognise a disk image by its SHA-1 and locate its asset table
    pub fn register_container_fingerprint(&self, fingerprint: &str, table_offset: u64) {
        self.filesystem
            .register_container_fingerprint(fingerprint, table_offset);
    }

    fn publish(&self, resource: Resource) -> CacheResult<ResourceId> {
        let kind = resource.kind();
        let strategy = resource.strategy();
        let id = self.registry.insert(resource)?;
        info!("Registered {:?} resource {} ({})", kind, id, strategy);
        self.scheduler.notify(id);
        Ok(id)
    }

    fn open_blob(
        &self,
        strategy: CacheStrategy,
        base_dir: &str,
        path: &str,
        kind: ResourceKind,
    ) -> CacheResult<BlobResource> {
        let file: Arc<dyn ByteSource> = Arc::new(self.filesystem.open_file(base_dir, path)?);
        Ok(BlobResource::new(file, strategy.resolve(kind), &self.config))
    }

    /// Register a whole-file resource. Returns its id and size.
    pub fn register_blob(
        &self,
        strategy: CacheStrategy,
        base_dir: &str,
        path: &str,
    ) -> CacheResult<(ResourceId, u64)> {
        let blob = self.open_blob(strategy, base_dir, path, ResourceKind::Blob)?;
        let size = blob.size();
        Ok((self.publish(Resource::Blob(blob))?, size))
    }

    /// Register an offset-addressed bank. Returns its id and file size.
    pub fn register_bank(
        &self,
        strategy: CacheStrategy,
        base_dir: &str,
        path: &str,
    ) -> CacheResult<(ResourceId, u64)> {
        let blob = self.open_blob(strategy, base_dir, path, ResourceKind::Bank)?;
        let size = blob.size();
        Ok((self.publish(Resource::Bank(BankResource::new(blob)))?, size))
    }

    /// Register a window of a disk image. `size` of 0 extends the window to
    /// the end of the asset entry holding `virtual_offset`. Returns the id
    /// and the window size.
    pub fn register_disk_image(
        &self,
        strategy: CacheStrategy,
        base_dir: &str,
        path: &str,
        virtual_offset: u64,
        size: u64,
    ) -> CacheResult<(ResourceId, u64)> {
        let size = (size != 0).then_some(size);
        let file: Arc<dyn ByteSource> = Arc::new(
            self.filesystem
                .open_disk_image_file(base_dir, path, virtual_offset, size)?,
        );
        let blob = BlobResource::new(
            file,
            strategy.resolve(ResourceKind::DiskImage),
            &self.config,
        );
        let size = blob.size();
        Ok((self.publish(Resource::DiskImage(blob))?, size))
    }

    /// Register a streaming sample.
    ///
    /// A `hint` with non-zero track and frame counts is trusted instead of
    /// probing the stream. Returns the id and the metadata in effect.
    pub fn register_audio(
        &self,
        strategy: CacheStrategy,
        codec: CodecType,
        base_dir: &str,
        path: &str,
        hint: Metadata,
    ) -> CacheResult<(ResourceId, Metadata)> {
        let file: Arc<dyn ByteSource> = Arc::new(self.filesystem.open_file(base_dir, path)?);
        let decoder = open_decoder(Arc::clone(&file), codec)?;
        let sample = SampleResource::open(
            file,
            decoder,
            strategy.resolve(ResourceKind::Sample),
            &self.config,
            hint,
        )?;
        let metadata = *sample.metadata();
        Ok((self.publish(Resource::Sample(sample))?, metadata))
    }

    /// Look up a registered resource
    pub fn resource(&self, id: ResourceId) -> CacheResult<Arc<Resource>> {
        self.registry.get(id)
    }

    /// Copy a range of resource `id` into `target`.
    ///
    /// On success the resource is queued for a preload pass; on error
    /// `target` is unchanged.
    pub fn dma(&self, id: ResourceId, target: &mut [u8], request: &DmaRequest) -> CacheResult<()> {
        let resource = self.registry.get(id)?;
        resource.dma(target, request)?;
        self.scheduler.notify(id);
        Ok(())
    }

    /// One frame of host time has passed.
    pub fn tick(&self) {
        self.scheduler.tick();
    }
}
