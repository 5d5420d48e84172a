//! Heuristic column resolution.
//!
//! Input revisions rename columns freely ("EachesPerCase" vs "Case Size",
//! "Location" vs "Store Name"), so every semantically-identified field is
//! located through an ordered rule table: exact names first, then the same
//! names case-insensitively, then substring keyword groups. First match wins.

/// Where a resolved field came from. Carried alongside values so emitted
/// output can flag low-confidence rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    ExactName,
    CaseInsensitiveName,
    Keyword,
    Default,
}

impl FieldSource {
    pub fn label(&self) -> &'static str {
        match self {
            FieldSource::ExactName => "exact",
            FieldSource::CaseInsensitiveName => "case-insensitive",
            FieldSource::Keyword => "keyword",
            FieldSource::Default => "default",
        }
    }
}

/// An ordered set of rules locating one logical field among headers.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Human-readable field name for log messages.
    pub label: &'static str,
    /// Alternative column names, in priority order.
    pub names: &'static [&'static str],
    /// Keyword groups; a header matches a group when it contains every
    /// keyword, compared lowercase.
    pub keywords: &'static [&'static [&'static str]],
}

impl FieldSpec {
    /// Resolves the field against a header row. Returns the column index
    /// and how it was found.
    pub fn resolve(&self, headers: &[String]) -> Option<(usize, FieldSource)> {
        for name in self.names {
            if let Some(idx) = headers.iter().position(|h| h.trim() == *name) {
                return Some((idx, FieldSource::ExactName));
            }
        }
        for name in self.names {
            if let Some(idx) = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
            {
                return Some((idx, FieldSource::CaseInsensitiveName));
            }
        }
        for group in self.keywords {
            if let Some(idx) = headers.iter().position(|h| {
                let lower = h.to_lowercase();
                group.iter().all(|kw| lower.contains(kw))
            }) {
                return Some((idx, FieldSource::Keyword));
            }
        }
        None
    }
}

/// Vendor product code column in the catalogue.
pub const PRODUCT_CODE: FieldSpec = FieldSpec {
    label: "product code",
    names: &[
        "AGLC SKU",
        "SKU",
        "Product Code",
        "Item Code",
        "AGLC Code",
        "Product SKU",
    ],
    keywords: &[&["sku"]],
};

/// Case-pack size column in the catalogue.
pub const CASE_PACK: FieldSpec = FieldSpec {
    label: "case pack size",
    names: &[
        "EachesPerCase",
        "Eaches Per Case",
        "Case Size",
        "CaseSize",
        "Units Per Case",
        "Case Quantity",
        "Case Qty",
        "Pack Size",
    ],
    keywords: &[
        &["case", "size"],
        &["case", "eaches"],
        &["case", "units"],
        &["eaches"],
    ],
};

/// Free-text supplier SKU field in POS rows.
pub const SUPPLIER_SKU: FieldSpec = FieldSpec {
    label: "supplier SKU",
    names: &[
        "Supplier SKU",
        "CNFR SKU",
        "CNB SKU",
        "CNB-SKU",
        "Supplier Code",
    ],
    keywords: &[&["supplier"]],
};

/// Internal SKU field in POS rows.
pub const SKU: FieldSpec = FieldSpec {
    label: "SKU",
    names: &["SKU", "Product SKU", "Item Code"],
    keywords: &[&["sku"]],
};

/// On-hand quantity field in POS rows.
pub const STOCK_QTY: FieldSpec = FieldSpec {
    label: "in stock quantity",
    names: &[
        "In Stock Qty",
        "Stock Qty",
        "Current Stock",
        "Quantity",
        "Qty",
        "In Stock",
    ],
    keywords: &[&["stock"], &["qty"]],
};

/// Location identifier field in POS rows.
pub const LOCATION: FieldSpec = FieldSpec {
    label: "location",
    names: &[
        "Location",
        "Store",
        "Outlet",
        "Branch",
        "Site",
        "Store Name",
        "Location Name",
    ],
    keywords: &[&["loc"], &["store"], &["branch"], &["site"], &["outlet"]],
};

/// Product classification field.
pub const CLASSIFICATION: FieldSpec = FieldSpec {
    label: "classification",
    names: &["Classification", "Format", "Category", "Product Type"],
    keywords: &[&["class"], &["categor"]],
};

/// Quantity already on order with the vendor.
pub const ON_ORDER: FieldSpec = FieldSpec {
    label: "on order",
    names: &["On Order", "On Order Qty", "OnOrder"],
    keywords: &[&["on", "order"]],
};

/// Units sold over a sales window.
pub const NET_SOLD: FieldSpec = FieldSpec {
    label: "net sold",
    names: &["Net Sold", "Units Sold", "Net Units Sold"],
    keywords: &[&["sold"]],
};

/// Average sale price over a sales window.
pub const AVG_PRICE: FieldSpec = FieldSpec {
    label: "average price",
    names: &["Avg Sold At Price", "Avg Price", "Average Price"],
    keywords: &[&["avg", "price"]],
};

/// Total cost over a sales window.
pub const TOTAL_COST: FieldSpec = FieldSpec {
    label: "total cost",
    names: &["Total Cost"],
    keywords: &[&["cost"]],
};

/// Product description field.
pub const PRODUCT: FieldSpec = FieldSpec {
    label: "product",
    names: &["Product", "Product Name", "Description"],
    keywords: &[&["product"]],
};

/// Brand field.
pub const BRAND: FieldSpec = FieldSpec {
    label: "brand",
    names: &["Brand", "Brand Name"],
    keywords: &[&["brand"]],
};

/// First receipt date field.
pub const FIRST_RECEIVED: FieldSpec = FieldSpec {
    label: "first received date",
    names: &["First Received Date", "First Received", "First Receipt Date"],
    keywords: &[&["first", "receiv"]],
};

/// Last receipt date field.
pub const LAST_RECEIVED: FieldSpec = FieldSpec {
    label: "last received date",
    names: &["Last Received Date", "Last Received", "Last Receipt Date"],
    keywords: &[&["last", "receiv"]],
};
