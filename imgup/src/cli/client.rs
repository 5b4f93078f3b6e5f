use clap::ArgMatches;
use client::UploadParams;

pub async fn upload(matches: &ArgMatches) {
    let uri = matches.get_one::<String>("uri").cloned().unwrap_or_default();
    let file = matches.get_one::<String>("file").cloned().unwrap_or_default();
    let mime = matches.get_one::<String>("mime").cloned();

    let mut fields = Vec::new();
    for raw in matches.get_many::<String>("field").unwrap_or_default() {
        match client::parse_field(raw) {
            Some(field) => fields.push(field),
            None => println!("ignoring malformed field '{raw}', expected name=value"),
        }
    }

    let params = UploadParams {
        uri,
        file,
        mime,
        fields,
    };
    client::upload_file(params).await;
}
