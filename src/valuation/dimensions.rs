//! Dimension resolution and size-tier classification.

use crate::domain::{CatalogEntry, Decimal, Dimensions, SizeTier, Sku};

/// Confidence when dimensions came from the catalog vs the placeholder.
pub const CATALOG_DIMENSION_CONFIDENCE: f64 = 0.90;
pub const PLACEHOLDER_DIMENSION_CONFIDENCE: f64 = 0.50;

/// Resolved dimensions plus whether real catalog data backed them.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionResolution {
    pub dimensions: Dimensions,
    pub from_catalog: bool,
    pub confidence: f64,
}

/// Resolve package dimensions for a SKU, defaulting to the placeholder.
pub fn resolve_dimensions(sku: &Sku, catalog: &[CatalogEntry]) -> DimensionResolution {
    let entry = catalog.iter().find(|e| &e.sku == sku);
    if let Some(entry) = entry {
        if let (Some(weight), Some(length), Some(width), Some(height)) = (
            entry.weight_lb,
            entry.length_in,
            entry.width_in,
            entry.height_in,
        ) {
            return DimensionResolution {
                dimensions: Dimensions {
                    weight_lb: weight,
                    length_in: length,
                    width_in: width,
                    height_in: height,
                },
                from_catalog: true,
                confidence: CATALOG_DIMENSION_CONFIDENCE,
            };
        }
    }
    DimensionResolution {
        dimensions: Dimensions::placeholder(),
        from_catalog: false,
        confidence: PLACEHOLDER_DIMENSION_CONFIDENCE,
    }
}

/// Sorted sides: (longest, median, shortest).
fn sorted_sides(dims: &Dimensions) -> (Decimal, Decimal, Decimal) {
    let mut sides = [dims.length_in, dims.width_in, dims.height_in];
    sides.sort();
    (sides[2], sides[1], sides[0])
}

/// Classify a package into its fulfillment size tier using billable weight
/// and longest-side/girth rules.
pub fn classify_size_tier(dims: &Dimensions) -> SizeTier {
    let (longest, median, shortest) = sorted_sides(dims);
    let weight = dims.billable_weight_lb();
    let girth = dims.girth_in();

    let dec = |n: i64| Decimal::from_i64(n);

    // Oversize ladder, worst first.
    if longest > dec(108) || girth > dec(165) || weight > dec(150) {
        return SizeTier::SpecialOversize;
    }
    let standard = weight <= dec(20)
        && longest <= dec(18)
        && median <= dec(14)
        && shortest <= dec(8);
    if !standard {
        if girth > dec(130) || weight > dec(70) {
            return SizeTier::LargeOversize;
        }
        if longest > dec(60) || median > dec(30) {
            return SizeTier::MediumOversize;
        }
        return SizeTier::SmallOversize;
    }

    // Small standard: light envelope-class packages.
    if weight <= dec(1)
        && longest <= dec(15)
        && median <= dec(12)
        && shortest <= Decimal::parse("0.75").unwrap_or_default()
    {
        return SizeTier::SmallStandard;
    }

    // Large standard weight bands.
    if weight <= dec(1) {
        SizeTier::LargeStandardUpTo1Lb
    } else if weight <= dec(2) {
        SizeTier::LargeStandardUpTo2Lb
    } else if weight <= dec(3) {
        SizeTier::LargeStandardUpTo3Lb
    } else {
        SizeTier::LargeStandardOver3Lb
    }
}
