use crate::types::{Band, BandSet, MaskKind};

/// Bands a mask needs in physical units before it can be evaluated
pub fn mask_required_bands(mask: MaskKind) -> BandSet {
    match mask {
        MaskKind::Cloud => BandSet::from([Band::B01, Band::B02, Band::B3N, Band::B04, Band::B13]),
        MaskKind::Snow => BandSet::from([Band::B01, Band::B04]),
        // Driven by acquisition date and grid only
        MaskKind::Water => BandSet::new(),
    }
}

/// Masks in cascade order with duplicates removed
pub fn ordered_masks(masks: &[MaskKind]) -> Vec<MaskKind> {
    MaskKind::ORDER
        .into_iter()
        .filter(|kind| masks.contains(kind))
        .collect()
}

/// Union of the requested output bands and every band the requested masks depend on
pub fn resolve_bands(requested: &BandSet, masks: &[MaskKind]) -> BandSet {
    ordered_masks(masks)
        .into_iter()
        .fold(requested.clone(), |acc, mask| acc.union(&mask_required_bands(mask)))
}

/// Bands ASTER scenes must carry to be run through the full preprocessing chain:
/// all VIS/SWIR bands plus B13
pub fn default_required_bands() -> BandSet {
    let mut bands = BandSet::vis_swir();
    bands.insert(Band::B13);
    bands
}
