use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::device::{GpuTexture, TextureDevice, TextureUpload};

use super::{
    BaseTextureId, ImageSource, SourceRetention, TextureError, TextureFrame, TextureId, TextureView,
};

#[derive(Debug, Copy, Clone)]
enum Residency {
    Unloaded,
    Resident(GpuTexture),
    /// Upload failed; not retried until the next device restore.
    Failed,
}

/// Physical texture record. Owned exclusively by the manager.
#[derive(Debug)]
struct BaseTexture {
    key: Arc<str>,
    width: u32,
    height: u32,
    refs: u32,
    residency: Residency,
    resident_before_loss: bool,
    /// `None` once discarded after upload.
    pixels: Option<Arc<[u8]>>,
    retention: SourceRetention,
}

/// Owns physical textures, their reference counts and GPU residency.
///
/// Logical handles ([`TextureId`]) are views onto physical records
/// ([`BaseTextureId`]). A physical record lives exactly as long as at least one
/// view references it; GPU memory is released the moment the count reaches zero.
#[derive(Debug, Default)]
pub struct ResourceManager {
    bases: SlotMap<BaseTextureId, BaseTexture>,
    views: SlotMap<TextureId, TextureView>,
    by_key: FxHashMap<Arc<str>, BaseTextureId>,
    uploads: u64,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical handle covering the whole physical texture.
    ///
    /// Sources are deduplicated by key: when the key is already live, the new
    /// handle views the existing texture and `source` is not read.
    pub fn acquire(&mut self, source: &ImageSource) -> TextureId {
        let base = self.acquire_base(source);
        let (w, h) = self
            .base_size(base)
            .unwrap_or((source.width(), source.height()));
        let frame = TextureFrame::new(crate::coords::Rect::new(0.0, 0.0, w as f32, h as f32));
        self.insert_view(base, frame)
    }

    /// Logical handle onto a sub-rectangle of the physical texture.
    ///
    /// The frame is checked against the texture the handle will view, which is
    /// the live one for an already known key.
    pub fn acquire_frame(
        &mut self,
        source: &ImageSource,
        frame: TextureFrame,
    ) -> Result<TextureId, TextureError> {
        let (w, h) = self
            .by_key
            .get(source.key())
            .and_then(|&id| self.base_size(id))
            .unwrap_or((source.width(), source.height()));
        if !frame.fits(w, h) {
            return Err(TextureError::FrameOutOfBounds {
                key: source.key().to_string(),
            });
        }
        let base = self.acquire_base(source);
        Ok(self.insert_view(base, frame))
    }

    fn acquire_base(&mut self, source: &ImageSource) -> BaseTextureId {
        if let Some(&id) = self.by_key.get(source.key()) {
            if let Some(base) = self.bases.get_mut(id) {
                if (base.width, base.height) != (source.width(), source.height()) {
                    log::warn!(
                        "texture `{}` is live at {}x{}; {}x{} source ignored",
                        base.key,
                        base.width,
                        base.height,
                        source.width(),
                        source.height()
                    );
                }
                base.refs += 1;
                return id;
            }
        }

        let key: Arc<str> = Arc::from(source.key());
        let id = self.bases.insert(BaseTexture {
            key: Arc::clone(&key),
            width: source.width(),
            height: source.height(),
            refs: 1,
            residency: Residency::Unloaded,
            resident_before_loss: false,
            pixels: Some(source.shared_pixels()),
            retention: source.retention(),
        });
        self.by_key.insert(key, id);
        log::debug!("texture `{}` created ({}x{})", source.key(), source.width(), source.height());
        id
    }

    fn insert_view(&mut self, base: BaseTextureId, frame: TextureFrame) -> TextureId {
        let (w, h) = self
            .bases
            .get(base)
            .map(|b| (b.width, b.height))
            .unwrap_or((1, 1));
        self.views.insert(TextureView::new(base, frame, w, h))
    }

    /// Drops one logical handle. At zero references the GPU texture is freed immediately.
    pub fn release(
        &mut self,
        id: TextureId,
        device: &mut dyn TextureDevice,
    ) -> Result<(), TextureError> {
        let view = self.views.remove(id).ok_or(TextureError::UnknownTexture(id))?;
        let base_id = view.base();

        let Some(base) = self.bases.get_mut(base_id) else {
            return Ok(());
        };
        base.refs = base.refs.saturating_sub(1);
        if base.refs > 0 {
            return Ok(());
        }

        if let Some(base) = self.bases.remove(base_id) {
            if let Residency::Resident(texture) = base.residency {
                device.destroy_texture(texture);
            }
            self.by_key.remove(&base.key);
            log::debug!("texture `{}` freed", base.key);
        }
        Ok(())
    }

    /// Uploads the physical texture behind `id` if it is not resident yet.
    pub fn ensure_resident(
        &mut self,
        id: TextureId,
        device: &mut dyn TextureDevice,
    ) -> Result<GpuTexture, TextureError> {
        let base = self.views.get(id).ok_or(TextureError::UnknownTexture(id))?.base();
        self.ensure_base_resident(base, device)
    }

    pub fn ensure_base_resident(
        &mut self,
        id: BaseTextureId,
        device: &mut dyn TextureDevice,
    ) -> Result<GpuTexture, TextureError> {
        let Some(base) = self.bases.get_mut(id) else {
            // Views keep their base alive, so this is a stale batch entry.
            return Err(TextureError::UnknownBase(id));
        };

        match base.residency {
            Residency::Resident(texture) => Ok(texture),
            Residency::Failed => Err(TextureError::Failed {
                key: base.key.to_string(),
            }),
            Residency::Unloaded => {
                let texture = upload(base, device)?;
                self.uploads += 1;
                Ok(texture)
            }
        }
    }

    /// Forgets every GPU texture. Logical handles and reference counts are untouched.
    pub fn on_device_lost(&mut self) {
        let mut resident = 0usize;
        for base in self.bases.values_mut() {
            // A second loss before restore must not forget the first one's residents.
            base.resident_before_loss |= matches!(base.residency, Residency::Resident(_));
            resident += base.resident_before_loss as usize;
            base.residency = Residency::Unloaded;
        }
        log::warn!(
            "device lost: {} of {} textures must be restored",
            resident,
            self.bases.len()
        );
    }

    /// Re-uploads every texture that was resident when the device was lost.
    ///
    /// Textures that were never drawn stay lazy. Failures are returned, and the
    /// affected textures are marked failed.
    pub fn on_device_restored(&mut self, device: &mut dyn TextureDevice) -> Vec<TextureError> {
        let mut errors = Vec::new();
        for base in self.bases.values_mut() {
            if !std::mem::take(&mut base.resident_before_loss) {
                continue;
            }
            match upload(base, device) {
                Ok(_) => self.uploads += 1,
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            log::info!("device restored; textures re-uploaded");
        } else {
            log::error!("device restored with {} texture failures", errors.len());
        }
        errors
    }

    #[inline]
    pub fn view(&self, id: TextureId) -> Option<&TextureView> {
        self.views.get(id)
    }

    #[inline]
    pub fn contains(&self, id: TextureId) -> bool {
        self.views.contains_key(id)
    }

    /// Logical handles currently referencing the physical texture behind `id`.
    pub fn ref_count(&self, id: TextureId) -> Option<u32> {
        let base = self.views.get(id)?.base();
        self.bases.get(base).map(|b| b.refs)
    }

    pub fn is_resident(&self, id: TextureId) -> bool {
        self.views
            .get(id)
            .and_then(|v| self.bases.get(v.base()))
            .is_some_and(|b| matches!(b.residency, Residency::Resident(_)))
    }

    pub fn base_size(&self, id: BaseTextureId) -> Option<(u32, u32)> {
        self.bases.get(id).map(|b| (b.width, b.height))
    }

    /// Number of live physical textures.
    #[inline]
    pub fn base_count(&self) -> usize {
        self.bases.len()
    }

    /// Number of live logical handles.
    #[inline]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Successful uploads since creation.
    #[inline]
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Frees every GPU texture and forgets all handles.
    pub fn clear(&mut self, device: &mut dyn TextureDevice) {
        for (_, base) in self.bases.drain() {
            if let Residency::Resident(texture) = base.residency {
                device.destroy_texture(texture);
            }
        }
        self.views.clear();
        self.by_key.clear();
    }
}

fn upload(base: &mut BaseTexture, device: &mut dyn TextureDevice) -> Result<GpuTexture, TextureError> {
    let Some(pixels) = base.pixels.as_ref() else {
        base.residency = Residency::Failed;
        return Err(TextureError::SourceDiscarded {
            key: base.key.to_string(),
        });
    };

    let result = device.create_texture(&TextureUpload {
        key: &base.key,
        width: base.width,
        height: base.height,
        pixels,
    });

    match result {
        Ok(texture) => {
            base.residency = Residency::Resident(texture);
            if base.retention == SourceRetention::DiscardAfterUpload {
                base.pixels = None;
            }
            log::trace!("texture `{}` uploaded", base.key);
            Ok(texture)
        }
        Err(e) => {
            base.residency = Residency::Failed;
            log::error!("texture `{}` upload failed: {e}", base.key);
            Err(TextureError::Upload {
                key: base.key.to_string(),
                reason: e.to_string(),
            })
        }
    }
}
