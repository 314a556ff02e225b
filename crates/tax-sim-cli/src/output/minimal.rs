use serde_json::Value;

/// Print just the key answer: the recommended regime and its annual tax for
/// a simulation, the filled month count for a completed series.
pub fn print_minimal(value: &Value) {
    if let Some(recommended) = value.get("recomendado").and_then(Value::as_str) {
        let annual_tax = value
            .get("regimes")
            .and_then(Value::as_array)
            .and_then(|regimes| {
                regimes
                    .iter()
                    .find(|r| r.get("nome").and_then(Value::as_str) == Some(recommended))
            })
            .and_then(|r| r.get("impostoTotalAnual"))
            .and_then(Value::as_str);
        match annual_tax {
            Some(tax) => println!("{}: {}", recommended, tax),
            None => println!("{}", recommended),
        }
        return;
    }

    if let Some(months) = value.get("baseMensal").and_then(Value::as_array) {
        let estimated = value.get("mesesEstimados").and_then(Value::as_u64).unwrap_or(0);
        println!("{} months ({} estimated)", months.len(), estimated);
        return;
    }

    println!("{}", serde_json::to_string(value).unwrap_or_default());
}
