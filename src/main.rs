fn main() {
    println!("rsid-retrieval - VCF liftover and dbSNP rsID annotation");
    println!();
    println!("🔬 Pipelines:");
    println!("  rsid_retrieval - CES1P1/CES1A2 → chr16 liftover, rsID annotation, filters, summary");
    println!("  rsid_sandbox   - Custom chromosome and position equation, then the same steps");
    println!();
    println!("📋 Utilities:");
    println!("  strip_rsids    - Reset every ID to '.' (VCF → VCF)");
    println!("  split_vcf      - One VCF per chromosome (VCF → <name>_chr<N>.vcf)");
    println!();
    println!("📖 For help with each tool:");
    println!("  cargo run -- --help                            # Named pipeline");
    println!("  cargo run --bin rsid_sandbox -- --help         # Sandbox pipeline");
    println!("  cargo run --bin strip_rsids -- --help");
    println!("  cargo run --bin split_vcf -- --help");
    println!();
    println!("🚀 Quick start example:");
    println!("  cargo run -- --input-vcf sample.vcf --output-dir out --email you@example.org --type CES1P1-CES1");
    println!();
    println!("💡 NCBI asks for a contact email; --save-email stores it in config.json for later runs.");
}
