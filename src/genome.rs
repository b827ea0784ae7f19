/// Normalize a raw genome identifier to its canonical key.
///
/// Tools report genomes as file paths (`/data/Genus/GCF_000836945.1.fasta`),
/// file names (`GCF_000836945.fasta`) or bare accessions. The key is the
/// final path segment up to its first dot, which removes both the sequence
/// file extension and any accession version. Never fails: identifiers
/// without a path or extension pass through trimmed.
pub fn normalize_genome_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let segment = trimmed
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(trimmed);

    match segment.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => segment.to_string(),
    }
}

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_with_version_and_extension() {
        assert_eq!(
            normalize_genome_id("/data/x/GCF_000836945.1.fasta"),
            "GCF_000836945"
        );
    }

    #[test]
    fn normalize_file_name_with_extension() {
        assert_eq!(normalize_genome_id("GCF_000836945.fasta"), "GCF_000836945");
    }

    #[test]
    fn normalize_bare_identifier_unchanged() {
        assert_eq!(normalize_genome_id("GCF_000836945"), "GCF_000836945");
        assert_eq!(normalize_genome_id("MN692957"), "MN692957");
    }

    #[test]
    fn normalize_windows_path_and_whitespace() {
        assert_eq!(normalize_genome_id(" C:\\genomes\\NC_001416.1.fa "), "NC_001416");
    }

    #[test]
    fn normalize_hidden_file_falls_back_to_segment() {
        assert_eq!(normalize_genome_id("dir/.fasta"), ".fasta");
        assert_eq!(normalize_genome_id(""), "");
    }
}
