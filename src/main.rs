use clap::{arg,crate_version,ArgAction,Command};
use h78::{huffman,lz78,base_name,Format};
use std::io::{Seek,SeekFrom};
use std::path::{Path,PathBuf};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &Path) -> bool {
    if path_out.exists() {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out.display());
        if std::io::stdin().read_line(&mut ans).is_err() {
            return false;
        }
        return ans.trim_end()=="y" || ans.trim_end()=="Y";
    }
    true
}

/// Name stored in the Huffman header when the payload is an LZ78 container
fn lz78_stage_name(name: &str) -> String {
    [".",name,".lz78"].concat()
}

fn compress(path_in: &Path,path_out: &Path,use_lz78: bool) -> STDRESULT {
    let mut in_file = std::fs::File::open(path_in)?;
    let mut out_file = std::fs::File::create(path_out)?;
    let name = base_name(path_in);
    let (in_size,out_size) = match use_lz78 {
        true => {
            // intermediate is unnamed and goes away when dropped, error or not
            let mut temp = tempfile::tempfile()?;
            let (in_size,lz_size) = lz78::encode(&mut in_file,&mut temp,&name,&lz78::STD_OPTIONS)?;
            log::info!("LZ78 stage produced {} bytes",lz_size);
            temp.seek(SeekFrom::Start(0))?;
            let (_,out_size) = huffman::encode(&mut temp,&mut out_file,&lz78_stage_name(&name))?;
            (in_size,out_size)
        },
        false => huffman::encode(&mut in_file,&mut out_file,&name)?
    };
    eprintln!("Original file size: {} bytes",in_size);
    eprintln!("Compressed file size: {} bytes",out_size);
    if in_size > 0 {
        eprintln!("Compression ratio: {:.6}",out_size as f64 / in_size as f64);
    }
    Ok(())
}

fn expand(path_in: &Path,out_dir: &Path,use_lz78: bool) -> STDRESULT {
    let mut in_file = std::fs::File::open(path_in)?;
    let path_out = match use_lz78 {
        true => {
            let mut temp = tempfile::tempfile()?;
            huffman::decode(&mut in_file,&mut temp)?;
            temp.seek(SeekFrom::Start(0))?;
            let header = h78::read_header(&mut temp,Format::LZ78)?;
            if !ok_to_overwrite(&header.output_path(out_dir)?) {
                eprintln!("abort operation");
                return Ok(());
            }
            temp.seek(SeekFrom::Start(0))?;
            lz78::decode_to_dir(&mut temp,out_dir,&lz78::STD_OPTIONS)?
        },
        false => {
            let header = h78::read_header(&mut in_file,Format::Huffman)?;
            if !ok_to_overwrite(&header.output_path(out_dir)?) {
                eprintln!("abort operation");
                return Ok(());
            }
            in_file.seek(SeekFrom::Start(0))?;
            huffman::decode_to_dir(&mut in_file,out_dir)?
        }
    };
    eprintln!("expanded {} into {}",path_in.display(),path_out.display());
    Ok(())
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `h78 compress -i my_file`           (writes my_file.csz)
With LZ78:     `h78 compress -l -i my_file`
Expand:        `h78 expand -i my_file.csz -d my_dir`
With LZ78:     `h78 expand -l -i my_file.csz`     (LZ78 must match how it was compressed)";

    let mut main_cmd = Command::new("h78")
        .about("Compress and expand with adaptive Huffman and optional LZ78")
        .after_long_help(long_help)
        .subcommand_required(true)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-l --lz78 "run LZ78 ahead of the Huffman stage").action(ArgAction::SetTrue))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path, default is input name with .csz suffix").required(false))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-l --lz78 "undo the LZ78 stage after the Huffman stage").action(ArgAction::SetTrue))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-d --dir <PATH> "directory for the expanded file, default is current").required(false))
        .about("expand a file, restoring its original name"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = PathBuf::from(cmd.get_one::<String>("input").expect(RCH));
        let path_out = match cmd.get_one::<String>("output") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from([&base_name(&path_in),".csz"].concat())
        };
        if !ok_to_overwrite(&path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        compress(&path_in,&path_out,cmd.get_flag("lz78"))?;
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = PathBuf::from(cmd.get_one::<String>("input").expect(RCH));
        let out_dir = match cmd.get_one::<String>("dir") {
            Some(d) => PathBuf::from(d),
            None => PathBuf::from(".")
        };
        expand(&path_in,&out_dir,cmd.get_flag("lz78"))?;
    }

    Ok(())
}
