use crate::catalog::Product;

fn contains_ignore_case(values: &[String], wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    values.iter().any(|value| value.to_lowercase() == wanted)
}

/// True when the product targets both the material and the finish.
pub fn is_exact_match(product: &Product, material: &str, finish: &str) -> bool {
    let target = &product.target_condition;
    contains_ignore_case(&target.material_category, material)
        && contains_ignore_case(&target.finish_type, finish)
}

/// Products targeting `material` and `finish`, in catalog order.
///
/// When nothing matches, the first catalog product is returned alone as a
/// generic recommendation. An empty catalog yields no products.
pub fn query_recommendation<'a>(
    material: &str,
    finish: &str,
    catalog: &'a [Product],
) -> Vec<&'a Product> {
    let matches: Vec<&Product> = catalog
        .iter()
        .filter(|product| is_exact_match(product, material, finish))
        .collect();

    if matches.is_empty() {
        return catalog.first().into_iter().collect();
    }

    matches
}
