use std::path::Path;

/// データベース設定を JSON にして表示
///
/// 出力は `SENZING_INIT_JSON` にそのまま設定できる形式です。
pub fn handle(senzing_root: Option<&Path>, ini_file: Option<&Path>, pretty: bool) -> anyhow::Result<()> {
    let path = szgo_config::find_ini_file(ini_file, senzing_root)?;
    let config = szgo_config::load_ini(&path)?;

    let json = if pretty {
        serde_json::to_string_pretty(&config)?
    } else {
        serde_json::to_string(&config)?
    };
    println!("{}", json);
    Ok(())
}
