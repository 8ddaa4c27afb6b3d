/// Dynamically swappable transform pipeline over a raw source
///
/// The wrapper never caches: every `get` re-reads the base and applies
/// whatever transforms are active at that moment. Careful when iterating
/// from multiple threads: a transform swap is visible non-atomically, so two
/// reads bracketing a `set_*` call may observe different transforms. Last
/// writer wins; there is no versioning.
use std::sync::{Arc, RwLock};

use candle_core::Tensor;

use super::{Example, Input, RawDataset};
use crate::{PoolError, Result};

/// A unary tensor transform applied on each read.
///
/// Random augmentations draw their own entropy; the wrapper makes no seeding
/// guarantee beyond what callers configure externally.
pub trait Transform: Send + Sync {
    fn apply(&self, x: &Tensor) -> candle_core::Result<Tensor>;
}

impl<F> Transform for F
where
    F: Fn(&Tensor) -> candle_core::Result<Tensor> + Send + Sync,
{
    fn apply(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        self(x)
    }
}

/// Chain multiple transforms.
pub struct Compose {
    transforms: Vec<Arc<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Arc<dyn Transform>>) -> Self {
        Self { transforms }
    }
}

impl Transform for Compose {
    fn apply(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut out = x.clone();
        for t in &self.transforms {
            out = t.apply(&out)?;
        }
        Ok(out)
    }
}

/// The swappable part of the pipeline, guarded by one lock.
struct TransformState {
    input: Option<Arc<dyn Transform>>,
    target: Option<Arc<dyn Transform>>,
    strong: Option<Arc<dyn Transform>>,
    return_indices: bool,
}

/// A dataset view that applies configurable transforms on every read.
///
/// Holds its base by shared reference (`Arc`), never copying the data. The
/// input and target transforms passed at construction are the defaults the
/// reset operations restore.
pub struct TransformDataset {
    base: Arc<dyn RawDataset>,
    state: RwLock<TransformState>,
    default_input: Option<Arc<dyn Transform>>,
    default_target: Option<Arc<dyn Transform>>,
    ignore_metadata: bool,
}

impl TransformDataset {
    pub fn new(
        base: Arc<dyn RawDataset>,
        input_transform: Option<Arc<dyn Transform>>,
        target_transform: Option<Arc<dyn Transform>>,
        ignore_metadata: bool,
    ) -> Self {
        Self {
            base,
            state: RwLock::new(TransformState {
                input: input_transform.clone(),
                target: target_transform.clone(),
                strong: None,
                return_indices: false,
            }),
            default_input: input_transform,
            default_target: target_transform,
            ignore_metadata,
        }
    }

    /// A view over `base` with no transforms.
    pub fn plain(base: Arc<dyn RawDataset>) -> Self {
        Self::new(base, None, None, false)
    }

    /// Size of the base source.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Read item `index` under the currently-active transforms.
    ///
    /// The weak view is the input transform applied to the raw input; when a
    /// strong transform is set it is applied to the same raw input and the
    /// item becomes a weak/strong pair. Target transform applies to the
    /// label. Out-of-range reads propagate the base source's error.
    pub fn get(&self, index: usize) -> Result<Example> {
        let item = self.base.get(index)?;
        if !item.extras.is_empty() && !self.ignore_metadata {
            return Err(PoolError::Dataset(format!(
                "item {} carries {} metadata field(s); construct the wrapper with \
                 ignore_metadata to discard them",
                index,
                item.extras.len()
            )));
        }

        let state = self.state.read().unwrap();

        let weak = match &state.input {
            Some(t) => t.apply(&item.input)?,
            None => item.input.clone(),
        };
        let input = match &state.strong {
            Some(t) => Input::Paired(weak, t.apply(&item.input)?),
            None => Input::Single(weak),
        };
        let label = match &state.target {
            Some(t) => t.apply(&item.label)?,
            None => item.label,
        };
        let index = state.return_indices.then_some(index);

        Ok(Example {
            input,
            label,
            index,
        })
    }

    /// The currently-active input transform.
    pub fn input_transform(&self) -> Option<Arc<dyn Transform>> {
        self.state.read().unwrap().input.clone()
    }

    pub fn set_input_transform(&self, transform: Option<Arc<dyn Transform>>) {
        self.state.write().unwrap().input = transform;
    }

    pub fn set_target_transform(&self, transform: Option<Arc<dyn Transform>>) {
        self.state.write().unwrap().target = transform;
    }

    pub fn set_strong_transform(&self, transform: Option<Arc<dyn Transform>>) {
        self.state.write().unwrap().strong = transform;
    }

    /// Restore the input transform captured at construction.
    pub fn reset_default_input_transform(&self) {
        self.state.write().unwrap().input = self.default_input.clone();
    }

    /// Restore the target transform captured at construction.
    pub fn reset_default_target_transform(&self) {
        self.state.write().unwrap().target = self.default_target.clone();
    }

    pub fn set_return_indices(&self, return_indices: bool) {
        self.state.write().unwrap().return_indices = return_indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawItem;
    use candle_core::{DType, Device};

    /// Base source yielding input [i, i] and label [i].
    struct Counting {
        n: usize,
        device: Device,
        with_extras: bool,
    }

    impl Counting {
        fn new(n: usize) -> Self {
            Self {
                n,
                device: Device::Cpu,
                with_extras: false,
            }
        }
    }

    impl RawDataset for Counting {
        fn len(&self) -> usize {
            self.n
        }

        fn get(&self, index: usize) -> Result<RawItem> {
            if index >= self.n {
                return Err(PoolError::Dataset(format!(
                    "index {} out of range ({})",
                    index, self.n
                )));
            }
            let v = index as f32;
            let input = Tensor::new(&[v, v], &self.device)?;
            let label = Tensor::new(&[v], &self.device)?;
            let mut item = RawItem::new(input, label);
            if self.with_extras {
                item.extras
                    .push(Tensor::zeros(1, DType::F32, &self.device)?);
            }
            Ok(item)
        }
    }

    fn double() -> Arc<dyn Transform> {
        Arc::new(|x: &Tensor| x * 2.0)
    }

    fn negate() -> Arc<dyn Transform> {
        Arc::new(|x: &Tensor| x * -1.0)
    }

    #[test]
    fn length_matches_base() {
        let ds = TransformDataset::plain(Arc::new(Counting::new(17)));
        assert_eq!(ds.len(), 17);
        assert!(!ds.is_empty());
    }

    #[test]
    fn get_applies_active_transforms() -> Result<()> {
        let ds = TransformDataset::new(Arc::new(Counting::new(4)), Some(double()), None, false);

        let item = ds.get(3)?;
        assert_eq!(item.input.primary().to_vec1::<f32>()?, vec![6.0, 6.0]);
        assert_eq!(item.label.to_vec1::<f32>()?, vec![3.0]);
        assert_eq!(item.index, None);

        // Swapping takes effect on the very next read.
        ds.set_input_transform(Some(negate()));
        let item = ds.get(3)?;
        assert_eq!(item.input.primary().to_vec1::<f32>()?, vec![-3.0, -3.0]);
        Ok(())
    }

    #[test]
    fn reset_restores_construction_default() -> Result<()> {
        let with_default =
            TransformDataset::new(Arc::new(Counting::new(4)), Some(double()), None, false);
        let untouched =
            TransformDataset::new(Arc::new(Counting::new(4)), Some(double()), None, false);

        with_default.set_input_transform(Some(negate()));
        with_default.reset_default_input_transform();

        let a = with_default.get(2)?.input.primary().to_vec1::<f32>()?;
        let b = untouched.get(2)?.input.primary().to_vec1::<f32>()?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn strong_transform_pairs_views() -> Result<()> {
        let ds = TransformDataset::new(Arc::new(Counting::new(4)), Some(double()), None, false);
        ds.set_strong_transform(Some(negate()));

        match ds.get(1)?.input {
            Input::Paired(weak, strong) => {
                // Both views derive from the untransformed input.
                assert_eq!(weak.to_vec1::<f32>()?, vec![2.0, 2.0]);
                assert_eq!(strong.to_vec1::<f32>()?, vec![-1.0, -1.0]);
            }
            Input::Single(_) => panic!("expected a paired input"),
        }

        ds.set_strong_transform(None);
        assert!(matches!(ds.get(1)?.input, Input::Single(_)));
        Ok(())
    }

    #[test]
    fn target_transform_applies_to_label() -> Result<()> {
        let ds = TransformDataset::plain(Arc::new(Counting::new(4)));
        ds.set_target_transform(Some(double()));
        assert_eq!(ds.get(2)?.label.to_vec1::<f32>()?, vec![4.0]);

        ds.reset_default_target_transform();
        assert_eq!(ds.get(2)?.label.to_vec1::<f32>()?, vec![2.0]);
        Ok(())
    }

    #[test]
    fn return_indices_appends_index() -> Result<()> {
        let ds = TransformDataset::plain(Arc::new(Counting::new(4)));
        ds.set_return_indices(true);
        assert_eq!(ds.get(2)?.index, Some(2));
        ds.set_return_indices(false);
        assert_eq!(ds.get(2)?.index, None);
        Ok(())
    }

    #[test]
    fn metadata_rejected_unless_ignored() -> Result<()> {
        let mut base = Counting::new(2);
        base.with_extras = true;
        let base = Arc::new(base);

        let strict = TransformDataset::plain(Arc::clone(&base) as Arc<dyn RawDataset>);
        assert!(matches!(strict.get(0), Err(PoolError::Dataset(_))));

        let lenient = TransformDataset::new(base, None, None, true);
        assert!(lenient.get(0).is_ok());
        Ok(())
    }

    #[test]
    fn out_of_range_propagates_base_error() {
        let ds = TransformDataset::plain(Arc::new(Counting::new(2)));
        assert!(ds.get(2).is_err());
    }

    #[test]
    fn compose_chains_in_order() -> Result<()> {
        let device = Device::Cpu;
        let add_one: Arc<dyn Transform> = Arc::new(|x: &Tensor| x + 1.0);
        let composed = Compose::new(vec![add_one, double()]);
        let x = Tensor::new(&[1.0f32], &device)?;
        assert_eq!(composed.apply(&x)?.to_vec1::<f32>()?, vec![4.0]);
        Ok(())
    }
}
