use std::fs;
use std::path::Path;

/// Writes a two-area `harbour` module plus the shared tables under `root`.
pub(crate) fn write_demo_content(root: &Path) {
    let module = root.join("modules").join("harbour");
    fs::create_dir_all(module.join("areas")).expect("module dirs");
    fs::create_dir_all(root.join("texturepacks")).expect("texture dir");

    fs::write(root.join("texturepacks").join("tex_tpa.erf"), b"").expect("texture pack");
    fs::write(
        root.join("surfacemat.xml"),
        r#"<SurfaceTypes>
  <surface index="0" label="stone" walk="1"/>
  <surface index="1" label="water" walk="0"/>
</SurfaceTypes>"#,
    )
    .expect("surface table");
    fs::write(
        module.join("module.xml"),
        r#"<Module>
  <name>Harbour</name>
  <entryArea>dock</entryArea>
  <entryPosition x="0" y="0"/>
  <areas><area>dock</area><area>bay</area></areas>
  <scripts onModuleLoad="mod_load"/>
</Module>"#,
    )
    .expect("module info");
    fs::write(
        module.join("areas").join("dock.xml"),
        r#"<Area resref="dock">
  <walkmesh><face surface="0" minX="-20" minY="-20" maxX="20" maxY="20"/></walkmesh>
  <objects><object tag="crate" kind="placeable" x="3" y="4" model="crate01"/></objects>
</Area>"#,
    )
    .expect("dock");
    fs::write(
        module.join("areas").join("bay.xml"),
        r#"<Area resref="bay">
  <walkmesh><face surface="0" minX="-20" minY="-20" maxX="20" maxY="20"/></walkmesh>
  <objects><object tag="wp_bay" kind="waypoint" x="1" y="2"/></objects>
</Area>"#,
    )
    .expect("bay");
    fs::write(
        module.join("scripts.xml"),
        r#"<Scripts>
  <script name="mod_load">
    <call fn="PrintString"><string>harbour loaded</string></call>
  </script>
</Scripts>"#,
    )
    .expect("scripts");
}
