use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

const ASSENTAMENTOS: [&str; 5] = ["Alegria", "Bela Vista", "Canaã", "Dois Irmãos", "Esperança"];
const MUNICIPIOS: [&str; 4] = ["Marabá", "Maraba", "Parauapebas", "São Félix do Xingu"];
const TECNICOS: [&str; 3] = ["Ana", "Bruno", "Carla"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

fn write_pgt(dir: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let tipos = [
        "Solicitação de documentação complementar",
        "Ofício",
        "Ata de reunião",
        "Memorando",
    ];
    let nomes = ["T1 Norte", "T1 Sul", "T1 Leste"];
    let objetivos = ["Titulação", "Regularização", ""];

    let mut writer = csv::Writer::from_path(dir.join("contPGT.csv")).context("creating contPGT.csv")?;
    writer.write_record(["Tipo de documento PGT", "Assentamento", "Nome T1", "Objetivo"])?;
    let n = 240;
    for _ in 0..n {
        writer.write_record([
            rng.pick(&tipos),
            rng.pick(&ASSENTAMENTOS),
            rng.pick(&nomes),
            rng.pick(&objetivos),
        ])?;
    }
    writer.flush()?;
    Ok(n)
}

fn write_planilhas(dir: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let nomes = ["Cadastro", "Vistorias", "Pareceres", "Contratos", "Georreferenciamento"];
    let mut writer =
        csv::Writer::from_path(dir.join("contPlanilhas.csv")).context("creating contPlanilhas.csv")?;
    writer.write_record(["Nome da Planilha", "Quantidade de Abas"])?;
    for nome in nomes {
        let abas = 1 + rng.below(12);
        writer.write_record([nome.to_string(), abas.to_string()])?;
    }
    writer.flush()?;
    Ok(nomes.len())
}

/// Pareceres go to Parquet so the sample exercises both sheet formats.
fn write_pareceres(dir: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let formatos = ["Digital", "Físico"];
    let andamentos = ["Concluído", "Em elaboração", "Arquivado"];
    let n = 600;

    let mut assentamento = Vec::with_capacity(n);
    let mut formato = Vec::with_capacity(n);
    let mut andamento = Vec::with_capacity(n);
    let mut numero = Vec::with_capacity(n);
    for i in 0..n {
        assentamento.push(rng.pick(&ASSENTAMENTOS));
        formato.push(rng.pick(&formatos));
        andamento.push(rng.pick(&andamentos));
        numero.push(1000 + i as i64);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("Número", DataType::Int64, false),
        Field::new("Assentamento", DataType::Utf8, false),
        Field::new("Formato", DataType::Utf8, false),
        Field::new("Andamento", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(numero)),
            Arc::new(StringArray::from(assentamento)),
            Arc::new(StringArray::from(formato)),
            Arc::new(StringArray::from(andamento)),
        ],
    )
    .context("building pareceres batch")?;

    let file = std::fs::File::create(dir.join("contPareceres.parquet"))
        .context("creating contPareceres.parquet")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(n)
}

fn write_relatorios(dir: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let tipos = ["Vistoria", "Supervisão", "Assistência técnica"];
    let modalidades = ["Presencial", "Remota"];
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).context("sample start date")?;

    let mut writer = csv::Writer::from_path(dir.join("contRelatorios.csv"))
        .context("creating contRelatorios.csv")?;
    writer.write_record([
        "Técnico",
        "Município",
        "Assentamento",
        "Tipo de relatório",
        "Modalidade",
        "Data",
    ])?;
    let n = 300;
    for _ in 0..n {
        let date = (start + Duration::days(rng.below(730) as i64))
            .format("%d/%m/%Y")
            .to_string();
        writer.write_record([
            rng.pick(&TECNICOS),
            rng.pick(&MUNICIPIOS),
            rng.pick(&ASSENTAMENTOS),
            rng.pick(&tipos),
            rng.pick(&modalidades),
            date.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(n)
}

fn main() -> Result<()> {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let pgt = write_pgt(&dir, &mut rng)?;
    let planilhas = write_planilhas(&dir, &mut rng)?;
    let pareceres = write_pareceres(&dir, &mut rng)?;
    let relatorios = write_relatorios(&dir, &mut rng)?;

    println!(
        "Wrote {pgt} PGT documents, {planilhas} spreadsheets, {pareceres} pareceres and \
         {relatorios} field reports to {}",
        dir.display()
    );
    println!("Try: sheet-dash --source {}", dir.display());
    Ok(())
}
